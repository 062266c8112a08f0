// Camera image directory listing for flat-file deployments
// File names look like 00001_D20210218-T194618.123.jpg: frame number, then the
// recorded date and time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::constants::IMAGE_EXTENSIONS;
use crate::error::{MetadataError, Result};
use crate::timestamp::{format_stored, parse_stored};

const IMAGE_NAME_PATTERN: &str = r"^(\d+)_D(\d{4})(\d{2})(\d{2})-T(\d{2})(\d{2})(\d{2}(?:\.\d+)?)";

/// One camera image as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedImage {
    pub number: i64,
    /// File name without extension, as stored in images.name.
    pub name: String,
    /// Recorded time in the stored format.
    pub time: String,
}

/// A file moved on disk to fix a repeated frame number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRename {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageListing {
    pub images: BTreeMap<i64, ListedImage>,
    /// Renames done by numbering repair, in the order they happened.
    pub renames: Vec<FileRename>,
    /// Image files left out: undecodable names, or a repeat whose repaired
    /// name was already taken.
    pub skipped: usize,
}

impl ImageListing {
    pub fn max_frame(&self) -> i64 {
        self.images.keys().next_back().copied().unwrap_or(0)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = format!(".{}", e.to_lowercase());
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Frame number and stored time decoded from an image file stem.
pub fn parse_image_name(re: &Regex, stem: &str) -> Option<(i64, String)> {
    let caps = re.captures(stem)?;
    let number = caps[1].parse().ok()?;
    let raw = format!(
        "{}-{}-{} {}:{}:{}",
        &caps[2], &caps[3], &caps[4], &caps[5], &caps[6], &caps[7]
    );
    let time = parse_stored(&raw).ok()?;
    Some((number, format_stored(&time)))
}

/// List the images of one camera directory, keyed by frame number.
///
/// Early systems sometimes wrote two consecutive files with the same frame
/// number. With `repair_numbering` set, the second file of such a pair is
/// renamed on disk to the next frame number.
pub fn list_camera_images(dir: &Path, repair_numbering: bool) -> Result<ImageListing> {
    if !dir.is_dir() {
        return Err(MetadataError::InvalidArgument(format!(
            "Camera image directory not found: {}",
            dir.display()
        )));
    }
    let re = Regex::new(IMAGE_NAME_PATTERN)
        .map_err(|e| MetadataError::Parse(format!("Image name pattern: {}", e)))?;

    let mut files: Vec<String> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            MetadataError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && is_image_file(path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();

    let mut listing = ImageListing::default();
    let mut decoded: Vec<(i64, String, String)> = Vec::with_capacity(files.len());
    for file in files {
        let stem = match Path::new(&file).file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        match parse_image_name(&re, &stem) {
            Some((number, _)) => decoded.push((number, file, stem)),
            None => {
                log::warn!("Skipping image with unrecognized name: {}", file);
                listing.skipped += 1;
            }
        }
    }

    for i in 1..decoded.len() {
        let previous = decoded[i - 1].0;
        let (number, file, stem) = &decoded[i];
        if *number == previous + 1 {
            continue;
        }
        if *number == previous && repair_numbering {
            let fixed = previous + 1;
            let new_file = renumber(file, fixed);
            let rename = FileRename { from: dir.join(file), to: dir.join(&new_file) };
            if rename.to.exists() {
                log::warn!("Not renaming {}: {} already exists", file, new_file);
                listing.skipped += 1;
                continue;
            }
            if let Err(e) = std::fs::rename(&rename.from, &rename.to) {
                undo_renames(&listing.renames);
                return Err(e.into());
            }
            log::info!("Renamed {} to {}", rename.from.display(), rename.to.display());
            let new_stem = renumber(stem, fixed);
            decoded[i] = (fixed, new_file, new_stem);
            listing.renames.push(rename);
        } else {
            log::warn!("Unexpected image numbering at {} (after frame {})", file, previous);
        }
    }

    for (number, _file, stem) in decoded {
        let time = match parse_image_name(&re, &stem) {
            Some((_, time)) => time,
            None => continue,
        };
        listing
            .images
            .entry(number)
            .or_insert(ListedImage { number, name: stem, time });
    }

    Ok(listing)
}

/// Move renamed files back, newest first. Failures are logged and skipped.
pub fn undo_renames(renames: &[FileRename]) {
    for rename in renames.iter().rev() {
        match std::fs::rename(&rename.to, &rename.from) {
            Ok(()) => log::info!("Restored {}", rename.from.display()),
            Err(e) => log::warn!(
                "Could not restore {} from {}: {}",
                rename.from.display(),
                rename.to.display(),
                e
            ),
        }
    }
}

/// Replace the leading frame number of a file name, keeping the rest.
fn renumber(file: &str, number: i64) -> String {
    match file.split_once('_') {
        Some((_, rest)) => format!("{:05}_{}", number, rest),
        None => format!("{:05}", number),
    }
}
