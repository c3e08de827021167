//! Patch text resolution with a built-in fallback.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Adds a one-line `test.py`. Used when no patch file is available.
pub const FALLBACK_PATCH: &str = "diff --git a/test.py b/test.py
new file mode 100644
index 0000000..1234567
--- /dev/null
+++ b/test.py
@@ -0,0 +1 @@
+# Test patch
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOrigin {
    File(PathBuf),
    Fallback {
        requested: PathBuf,
        /// Read error when the file existed but could not be read.
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPatch {
    pub text: String,
    pub origin: PatchOrigin,
}

/// Read the patch at `path` verbatim, or fall back to [`FALLBACK_PATCH`].
///
/// Never fails: a missing or unreadable file only changes the origin.
pub fn resolve_patch(path: &Path) -> ResolvedPatch {
    if !path.is_file() {
        debug!(path = %path.display(), "patch file not found, using fallback");
        return ResolvedPatch {
            text: FALLBACK_PATCH.to_string(),
            origin: PatchOrigin::Fallback {
                requested: path.to_path_buf(),
                reason: None,
            },
        };
    }

    match fs::read_to_string(path) {
        Ok(text) => ResolvedPatch {
            text,
            origin: PatchOrigin::File(path.to_path_buf()),
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "patch file unreadable, using fallback");
            ResolvedPatch {
                text: FALLBACK_PATCH.to_string(),
                origin: PatchOrigin::Fallback {
                    requested: path.to_path_buf(),
                    reason: Some(e.to_string()),
                },
            }
        }
    }
}
