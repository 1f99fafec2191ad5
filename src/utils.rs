use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Container the segments are remuxed into.
pub const OUTPUT_EXTENSION: &str = "mp4";

pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads"))
}

pub fn segment_file_name(index: usize, extension: &str) -> String {
    format!("segment_{:05}.{}", index, extension)
}

/// Append the output extension unless the name already carries it.
pub fn normalize_output_name(name: &str) -> String {
    let suffix = format!(".{}", OUTPUT_EXTENSION);
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// First unused `downloaded_NNN.mp4` in `dir`, counting from 001.
pub fn next_output_name(dir: &Path) -> String {
    let pattern = dir.join(format!("downloaded_*.{}", OUTPUT_EXTENSION));
    let taken: HashSet<u32> = glob::glob(&pattern.to_string_lossy())
        .map(|paths| {
            paths
                .filter_map(Result::ok)
                .filter_map(|p| {
                    p.file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.strip_prefix("downloaded_"))
                        .and_then(|n| n.parse::<u32>().ok())
                })
                .collect()
        })
        .unwrap_or_default();

    let number = (1..).find(|n| !taken.contains(n)).unwrap_or(1);
    format!("downloaded_{:03}.{}", number, OUTPUT_EXTENSION)
}

/// Scratch directory holding one job's segments, next to its final artifact.
pub fn job_work_dir(output_dir: &Path, output_name: &str) -> PathBuf {
    let stem = Path::new(output_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| output_name.to_string());
    output_dir.join(format!("temp_{}", sanitize_filename(&stem)))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}
