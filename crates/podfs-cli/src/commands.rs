use std::fs::File;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use colored::Colorize;
use podfs_crypto::RootSecret;
use podfs_dir::DirEntry;
use podfs_pod::{EngineConfig, Pod, PodEngine};
use podfs_store::{CachingStore, InMemoryObjectStore};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    match cli.command {
        Some(Command::Config) => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Some(Command::Shell(args)) => run_shell(config, args),
        None => run_shell(config, ShellArgs::default()),
    }
}

fn run_shell(config: EngineConfig, args: ShellArgs) -> anyhow::Result<()> {
    let mut shell = Shell::new(config);
    if let Some(secret) = args.secret {
        shell.execute(ShellCommand::Login {
            secret: Some(secret),
        })?;
    }
    println!("{} Type {} for commands.", "podfs".bold(), "help".cyan());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buf = String::new();
    loop {
        print!("{} ", shell.prompt());
        io::stdout().flush()?;
        buf.clear();
        if input.read_line(&mut buf)? == 0 {
            break;
        }
        let words: Vec<&str> = buf.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let line = match Line::try_parse_from(&words) {
            Ok(line) => line,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };
        match shell.execute(line.command) {
            Ok(Flow::Exit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("{} {e:#}", "error:".red().bold()),
        }
    }
    shell.engine.logout();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive session over an engine backed by the in-memory store.
pub struct Shell {
    engine: PodEngine,
    store: Arc<CachingStore<InMemoryObjectStore>>,
    current: Option<Pod>,
}

impl Shell {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(CachingStore::new(
            InMemoryObjectStore::new(),
            config.cache_capacity,
        ));
        Self {
            engine: PodEngine::new(store.clone(), config),
            store,
            current: None,
        }
    }

    pub fn prompt(&self) -> String {
        match self.current.as_ref().and_then(|pod| pod.pwd().ok()) {
            Some(cwd) => format!("{}{}", cwd.to_string().green(), ">".bold()),
            None if self.engine.is_logged_in() => format!("{}", "(no pod)>".yellow()),
            None => format!("{}", "(logged out)>".dimmed()),
        }
    }

    pub fn execute(&mut self, command: ShellCommand) -> anyhow::Result<Flow> {
        match command {
            ShellCommand::Login { secret } => self.cmd_login(secret)?,
            ShellCommand::Logout => {
                self.engine.logout();
                self.current = None;
                println!("Logged out.");
            }
            ShellCommand::Pod(cmd) => self.cmd_pod(cmd)?,
            ShellCommand::Mkdir { path } => {
                let created = self.pod()?.mkdir(&path)?;
                println!("{} {}", "created".green(), created);
            }
            ShellCommand::Rmdir { path } => {
                self.pod()?.rmdir(&path)?;
                println!("{} {}", "removed".green(), path);
            }
            ShellCommand::Cd { path } => {
                self.pod()?.cd(path.as_deref().unwrap_or("/"))?;
            }
            ShellCommand::Pwd => println!("{}", self.pod()?.pwd()?),
            ShellCommand::Ls { path } => self.cmd_ls(path.as_deref().unwrap_or("."))?,
            ShellCommand::Stat { path } => self.cmd_stat(&path)?,
            ShellCommand::Put {
                local,
                dir,
                name,
                block_size,
            } => {
                let name = match name {
                    Some(name) => name,
                    None => local
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("cannot derive a name from {}", local.display()))?,
                };
                let file = File::open(&local)
                    .with_context(|| format!("opening {}", local.display()))?;
                let size = file.metadata()?.len();
                let entry = self.pod()?.upload(file, &dir, &name, size, block_size)?;
                println!(
                    "{} {} ({} bytes, {} blocks) {}",
                    "uploaded".green(),
                    name.bold(),
                    size,
                    entry.metadata.block_count(),
                    entry.address.short_hex().dimmed()
                );
            }
            ShellCommand::Get { path, local } => {
                let mut reader = self.pod()?.download(&path)?;
                match local {
                    Some(local) => {
                        let mut out = File::create(&local)
                            .with_context(|| format!("creating {}", local.display()))?;
                        let n = io::copy(&mut reader, &mut out)?;
                        println!("{} {} bytes to {}", "wrote".green(), n, local.display());
                    }
                    None => {
                        let stdout = io::stdout();
                        let mut lock = stdout.lock();
                        io::copy(&mut reader, &mut lock)?;
                        writeln!(lock)?;
                    }
                }
            }
            ShellCommand::Rm { path } => {
                self.pod()?.rm(&path)?;
                println!("{} {}", "removed".green(), path);
            }
            ShellCommand::Tree => {
                let pod = self.pod()?;
                for dir in pod.directory_paths()? {
                    println!("{}/", dir.to_string().blue());
                }
                for file in pod.file_paths()? {
                    println!("{file}");
                }
            }
            ShellCommand::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn pod(&self) -> anyhow::Result<&Pod> {
        self.current
            .as_ref()
            .ok_or_else(|| anyhow!("no pod selected; use `pod new` or `pod open`"))
    }

    fn cmd_login(&mut self, secret: Option<String>) -> anyhow::Result<()> {
        let root = match secret {
            Some(text) => parse_secret(&text)?,
            None => {
                let root = RootSecret::generate();
                println!("Generated secret {}", hex::encode(root.as_bytes()).yellow());
                root
            }
        };
        let owner = self.engine.login(root)?;
        self.current = None;
        println!("{} as {}", "Logged in".green().bold(), owner.short_hex().cyan());
        Ok(())
    }

    fn cmd_pod(&mut self, cmd: PodCommand) -> anyhow::Result<()> {
        match cmd {
            PodCommand::New { name } => {
                let pod = self.engine.create_pod(&name)?;
                println!("{} pod {} (slot {})", "created".green(), name.bold(), pod.index());
                self.current = Some(pod);
            }
            PodCommand::Open { name } => {
                let pod = self.engine.open_pod(&name)?;
                let files = pod.file_paths()?.len();
                let dirs = pod.directory_paths()?.len();
                println!(
                    "{} pod {} ({dirs} directories, {files} files)",
                    "opened".green(),
                    name.bold()
                );
                self.current = Some(pod);
            }
            PodCommand::Close { name } => {
                let name = match name {
                    Some(name) => name,
                    None => self.pod()?.name().to_string(),
                };
                self.engine.close_pod(&name)?;
                if self.current.as_ref().is_some_and(|p| p.name() == name) {
                    self.current = None;
                }
                println!("{} pod {}", "closed".green(), name.bold());
            }
            PodCommand::Delete { name } => {
                self.engine.delete_pod(&name)?;
                if self.current.as_ref().is_some_and(|p| p.name() == name) {
                    self.current = None;
                }
                println!("{} pod {}", "deleted".green(), name.bold());
            }
            PodCommand::Sync => {
                let report = self.pod()?.sync()?;
                println!(
                    "{} {} directories, {} files, {} skipped",
                    "synced".green(),
                    report.directories,
                    report.files,
                    report.skipped
                );
            }
            PodCommand::Ls => {
                for name in self.engine.list_pods()? {
                    let state = self.engine.pod_state(&name)?;
                    println!("{:<25} {:?}", name, state);
                }
            }
            PodCommand::Stat { name } => {
                let stat = self.engine.pod_stat(&name)?;
                println!("Pod:      {}", stat.name.bold());
                println!("Slot:     {}", stat.index);
                println!("State:    {:?}", stat.state);
                println!("Owner:    {}", stat.owner.to_string().cyan());
                println!("Root:     {}", stat.root.to_string().dimmed());
                println!("Children: {}", stat.children);
                println!("Modified: {}", format_time(stat.root_meta.modification_time));
            }
        }
        Ok(())
    }

    fn cmd_ls(&self, path: &str) -> anyhow::Result<()> {
        for entry in self.pod()?.ls(path)? {
            match entry {
                DirEntry::Directory { path, .. } => {
                    println!("{}  {}/", "d".blue(), path.name().blue().bold());
                }
                DirEntry::File { metadata, .. } => {
                    println!(
                        "{}  {:<25} {:>10}  {}",
                        "f".normal(),
                        metadata.name,
                        metadata.size,
                        metadata.content_type.dimmed()
                    );
                }
            }
        }
        Ok(())
    }

    fn cmd_stat(&self, path: &str) -> anyhow::Result<()> {
        let pod = self.pod()?;
        match pod.dir_stat(path) {
            Ok(stat) => {
                println!("Directory: {}", stat.path.to_string().blue().bold());
                println!("Entries:   {} directories, {} files", stat.directories, stat.files);
                println!("Created:   {}", format_time(stat.meta.creation_time));
                println!("Modified:  {}", format_time(stat.meta.modification_time));
            }
            Err(podfs_pod::PodError::NotADirectory(_)) => {
                let stat = pod.file_stat(path)?;
                println!("File:      {}", stat.path.to_string().bold());
                println!("Size:      {} bytes", stat.metadata.size);
                println!("Type:      {}", stat.metadata.content_type);
                println!(
                    "Blocks:    {} x {} bytes",
                    stat.blocks.len(),
                    stat.metadata.block_size
                );
                println!("Address:   {}", stat.address.to_string().dimmed());
                println!("Created:   {}", format_time(stat.metadata.creation_time));
            }
            Err(e) => return Err(e.into()),
        }
        let cache = self.store.stats();
        tracing::debug!(
            hits = cache.hits,
            misses = cache.misses,
            entries = cache.entries,
            "store cache"
        );
        Ok(())
    }
}

fn parse_secret(text: &str) -> anyhow::Result<RootSecret> {
    let bytes = hex::decode(text.trim()).context("secret must be hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow!("secret must be 32 bytes, got {}", v.len()))?;
    Ok(RootSecret::from_bytes(bytes))
}

fn format_time(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(shell: &mut Shell, words: &[&str]) -> anyhow::Result<Flow> {
        let line = Line::try_parse_from(words)?;
        shell.execute(line.command)
    }

    fn logged_in() -> Shell {
        let mut shell = Shell::new(EngineConfig::default());
        let secret = "11".repeat(32);
        run(&mut shell, &["login", secret.as_str()]).unwrap();
        shell
    }

    #[test]
    fn secret_must_be_32_hex_bytes() {
        assert!(parse_secret(&"ab".repeat(32)).is_ok());
        assert!(parse_secret("abcd").is_err());
        assert!(parse_secret("zz").is_err());
    }

    #[test]
    fn commands_need_a_pod() {
        let mut shell = logged_in();
        assert!(run(&mut shell, &["mkdir", "a"]).is_err());
        run(&mut shell, &["pod", "new", "alice"]).unwrap();
        run(&mut shell, &["mkdir", "a/b"]).unwrap();
        run(&mut shell, &["cd", "a/b"]).unwrap();
        assert_eq!(shell.pod().unwrap().pwd().unwrap().to_string(), "/alice/a/b");
    }

    #[test]
    fn put_and_get_through_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("note.txt");
        std::fs::write(&local, vec![b'x'; 540]).unwrap();
        let back = dir.path().join("back.txt");

        let mut shell = logged_in();
        run(&mut shell, &["pod", "new", "alice"]).unwrap();
        run(&mut shell, &["mkdir", "docs"]).unwrap();
        let local_arg = local.to_string_lossy().to_string();
        run(&mut shell, &["put", local_arg.as_str(), "docs", "--block-size", "100"]).unwrap();
        let back_arg = back.to_string_lossy().to_string();
        run(&mut shell, &["get", "docs/note.txt", back_arg.as_str()]).unwrap();
        assert_eq!(std::fs::read(&back).unwrap(), vec![b'x'; 540]);

        run(&mut shell, &["pod", "close"]).unwrap();
        assert!(shell.current.is_none());
        run(&mut shell, &["pod", "open", "alice"]).unwrap();
        let stat = shell.pod().unwrap().file_stat("/docs/note.txt").unwrap();
        assert_eq!(stat.blocks.len(), 6);
    }

    #[test]
    fn exit_stops_the_loop() {
        let mut shell = Shell::new(EngineConfig::default());
        assert_eq!(run(&mut shell, &["exit"]).unwrap(), Flow::Exit);
    }

    #[test]
    fn missing_local_file_is_reported() {
        let mut shell = logged_in();
        run(&mut shell, &["pod", "new", "p"]).unwrap();
        let missing = PathBuf::from("/definitely/not/here.bin");
        let arg = missing.to_string_lossy().to_string();
        let err = run(&mut shell, &["put", arg.as_str()]).unwrap_err();
        assert!(format!("{err:#}").contains("opening"));
    }
}
