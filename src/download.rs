// download.rs: pick where a download is written
//
// Never overwrite: `name`, then `name.1`, `name.2`, ... up to `name.998`.

use std::path::{Path, PathBuf};

/// Suffix counter ceiling. `name.<MAX_SUFFIX - 1>` is never tried.
pub const MAX_SUFFIX: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("suffix reached limit for download {}", base.display())]
    SuffixLimit { base: PathBuf },
}

/// Replace path separators so a server-suggested name stays inside the
/// download directory.
pub fn sanitize(suggested: &str) -> String {
    let clean = suggested.replace('/', "_");
    if clean.is_empty() {
        "download".into()
    } else {
        clean
    }
}

pub fn destination(dir: &Path, suggested: &str) -> Result<PathBuf, DownloadError> {
    let base = dir.join(sanitize(suggested));
    if !base.exists() {
        return Ok(base);
    }

    let free = (1..MAX_SUFFIX - 1)
        .map(|n| {
            let mut candidate = base.clone().into_os_string();
            candidate.push(format!(".{n}"));
            PathBuf::from(candidate)
        })
        .find(|candidate| !candidate.exists());
    free.ok_or(DownloadError::SuffixLimit { base })
}

// ── tests ─────────────────────────────────────────────────────────────────────
