//! Most-recently-used list of opened media files.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub const DEFAULT_LIMIT: usize = 10;

/// Bounded, duplicate-free list, most recent first.
#[derive(Debug, Clone)]
pub struct RecentFiles {
    entries: VecDeque<PathBuf>,
    limit: usize,
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl RecentFiles {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// Move `path` to the front, evicting the oldest entry on overflow.
    pub fn record(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.entries.retain(|existing| *existing != path);
        self.entries.push_front(path);
        self.entries.truncate(self.limit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Menu label for an entry: the file name, or the whole path if it has none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(recent: &RecentFiles) -> Vec<&str> {
        recent.iter().map(|p| p.to_str().unwrap()).collect()
    }

    #[test]
    fn reinsertion_moves_to_front_and_oldest_is_evicted() {
        let mut recent = RecentFiles::new(2);
        for path in ["A", "B", "A", "C"] {
            recent.record(path);
        }
        assert_eq!(order(&recent), vec!["C", "A"]);
    }

    #[test]
    fn never_exceeds_limit() {
        let mut recent = RecentFiles::default();
        for i in 0..25 {
            recent.record(format!("/videos/{i}.mp4"));
        }
        assert_eq!(recent.iter().count(), DEFAULT_LIMIT);
        assert_eq!(recent.iter().next(), Some(Path::new("/videos/24.mp4")));
        assert_eq!(recent.iter().last(), Some(Path::new("/videos/15.mp4")));
    }

    #[test]
    fn duplicate_of_front_keeps_single_entry() {
        let mut recent = RecentFiles::new(5);
        recent.record("/a.mkv");
        recent.record("/a.mkv");
        assert_eq!(order(&recent), vec!["/a.mkv"]);
    }

    #[test]
    fn zero_limit_still_keeps_latest() {
        let mut recent = RecentFiles::new(0);
        recent.record("/a.mkv");
        recent.record("/b.mkv");
        assert_eq!(order(&recent), vec!["/b.mkv"]);
    }

    #[test]
    fn display_name_is_file_name() {
        assert_eq!(display_name(Path::new("/home/me/clip.webm")), "clip.webm");
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
