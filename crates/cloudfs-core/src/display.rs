// Display rows for a directory listing
use std::fmt;
use std::sync::OnceLock;

use cloudfs_platform::storage::{DirectoryListing, FileEntry};

/// Read-only presentation settings shared by every browser in the process
#[derive(Debug)]
pub struct DisplayStyle {
    pub parent_name: &'static str,
    pub directory_prefix: &'static str,
    pub size_suffix: &'static str,
}

static STYLE: OnceLock<DisplayStyle> = OnceLock::new();

pub fn style() -> &'static DisplayStyle {
    STYLE.get_or_init(|| DisplayStyle {
        parent_name: "..",
        directory_prefix: "dir: ",
        size_suffix: "kb",
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Directory,
    File { size_kb: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub name: String,
    pub kind: RowKind,
}

impl DisplayRow {
    pub fn parent() -> Self {
        Self {
            name: style().parent_name.to_string(),
            kind: RowKind::Directory,
        }
    }

    pub fn from_entry(entry: &FileEntry) -> Self {
        let kind = if entry.is_directory {
            RowKind::Directory
        } else {
            RowKind::File {
                size_kb: size_in_kb(entry.size.unwrap_or(0)),
            }
        };
        Self {
            name: entry.name.clone(),
            kind,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, RowKind::Directory)
    }
}

impl fmt::Display for DisplayRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = style();
        match self.kind {
            RowKind::Directory => write!(f, "{}{}", style.directory_prefix, self.name),
            RowKind::File { size_kb } => write!(f, "{} {}{}", self.name, size_kb, style.size_suffix),
        }
    }
}

/// Unrounded kilobytes
pub fn size_in_kb(size: u64) -> f64 {
    size as f64 / 1024.0
}

/// Parent entry first, then the listing in the order it was returned
pub fn rows(listing: &DirectoryListing) -> Vec<DisplayRow> {
    std::iter::once(DisplayRow::parent())
        .chain(listing.files.iter().map(DisplayRow::from_entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_kb_is_not_rounded() {
        assert_eq!(size_in_kb(2048), 2.0);
        assert_eq!(size_in_kb(1536), 1.5);
        assert_eq!(size_in_kb(0), 0.0);
    }

    #[test]
    fn test_row_formatting() {
        let file = DisplayRow::from_entry(&FileEntry::file("a.bin", 1536));
        assert_eq!(file.to_string(), "a.bin 1.5kb");
        let even = DisplayRow::from_entry(&FileEntry::file("b.bin", 2048));
        assert_eq!(even.to_string(), "b.bin 2kb");
        let dir = DisplayRow::from_entry(&FileEntry::directory("docs"));
        assert_eq!(dir.to_string(), "dir: docs");
        assert_eq!(DisplayRow::parent().to_string(), "dir: ..");
    }

    #[test]
    fn test_rows_keep_collaborator_order() {
        let listing = DirectoryListing {
            path: ".".to_string(),
            files: vec![
                FileEntry::file("z.txt", 1),
                FileEntry::directory("a"),
                FileEntry::file("m.txt", 2),
            ],
        };
        let names: Vec<_> = rows(&listing).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["..", "z.txt", "a", "m.txt"]);
    }

    #[test]
    fn test_style_is_shared() {
        assert!(std::ptr::eq(style(), style()));
    }
}
