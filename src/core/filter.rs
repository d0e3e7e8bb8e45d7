//! Listed-target filter.

use std::path::{Component, Path, PathBuf};

/// Caller-supplied set of directories an action is restricted to.
///
/// Empty means every unit is listed. Otherwise a directory is listed when
/// it lies under one of the paths, or equals one exactly in exclusive mode.
#[derive(Debug, Clone, Default)]
pub struct ListedFilter {
    paths: Vec<PathBuf>,
    exclusive: bool,
}

impl ListedFilter {
    pub fn new<I, P>(paths: I, exclusive: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut paths: Vec<PathBuf> = paths.into_iter().map(|p| clean(p.as_ref())).collect();
        paths.sort();
        paths.dedup();
        ListedFilter { paths, exclusive }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Check a directory, given relative to the scan root.
    pub fn matches(&self, dir: &Path) -> bool {
        if self.paths.is_empty() {
            return true;
        }

        let dir = clean(dir);
        if self.exclusive {
            self.paths.iter().any(|p| *p == dir)
        } else {
            self.paths.iter().any(|p| dir.starts_with(p))
        }
    }
}

/// Lexically normalize a relative path: drop `.` and resolve `..`.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
