use crate::error::{PodError, PodResult};

/// Check a directory or file name before anything touches the store.
pub fn validate_name(name: &str, max_len: usize) -> PodResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(PodError::InvalidName(name.to_string()));
    }
    if name.len() > max_len {
        return Err(PodError::NameTooLong {
            name: name.to_string(),
            max: max_len,
        });
    }
    Ok(())
}

/// Pod names additionally may not contain the record table's separators.
pub fn validate_pod_name(name: &str, max_len: usize) -> PodResult<()> {
    validate_name(name, max_len)?;
    if name.contains(',') || name.contains('\n') {
        return Err(PodError::InvalidName(name.to_string()));
    }
    Ok(())
}
