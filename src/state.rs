use serde::{Deserialize, Serialize};

/// One contiguous, inclusive byte range of the resource and how much of it
/// has already been written to its partial file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Part {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub read_length: u64,
    pub filename: String,
}

impl Part {
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_completed(&self) -> bool {
        self.read_length == self.size()
    }

    /// First byte that still has to be fetched.
    pub fn next_offset(&self) -> u64 {
        self.start + self.read_length
    }

    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.next_offset(), self.end)
    }
}

/// Splits `[0, total_size)` into `workers` contiguous parts. Every part gets
/// `total_size / workers` bytes and the last one takes the remainder.
///
/// An empty resource yields no parts, and the worker count is lowered to
/// `total_size` when there are fewer bytes than workers.
pub fn split(total_size: u64, workers: usize, filename: &str) -> Vec<Part> {
    if total_size == 0 {
        return vec![];
    }
    let workers = (workers.max(1) as u64).min(total_size);
    let part_size = total_size / workers;

    (0..workers)
        .map(|i| {
            let start = i * part_size;
            let end = if i == workers - 1 {
                total_size - 1
            } else {
                start + part_size - 1
            };
            Part {
                index: i as usize,
                start,
                end,
                read_length: 0,
                filename: filename.to_string(),
            }
        })
        .collect()
}

/// Checks that `parts` is a dense, ordered-by-index partition of
/// `[0, total_size)` sharing `filename`. Returns a description of the first
/// violation found.
pub fn validate_partition(parts: &[Part], total_size: u64, filename: &str) -> Result<(), String> {
    let mut sorted: Vec<&Part> = parts.iter().collect();
    sorted.sort_by_key(|p| p.index);

    let mut next = 0u64;
    for (expected_index, part) in sorted.iter().enumerate() {
        if part.index != expected_index {
            return Err(format!("missing part index {}", expected_index));
        }
        if part.filename != filename {
            return Err(format!(
                "part {} belongs to {:?}, expected {:?}",
                part.index, part.filename, filename
            ));
        }
        if part.start != next || part.end < part.start {
            return Err(format!(
                "part {} covers {}-{}, expected to start at {}",
                part.index, part.start, part.end, next
            ));
        }
        if part.read_length > part.size() {
            return Err(format!(
                "part {} has read {} bytes of {}",
                part.index,
                part.read_length,
                part.size()
            ));
        }
        next = part.end + 1;
    }

    if next != total_size {
        return Err(format!("parts cover {} bytes, resource has {}", next, total_size));
    }
    Ok(())
}

pub fn all_completed(parts: &[Part]) -> bool {
    parts.iter().all(Part::is_completed)
}
