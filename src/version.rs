use std::cmp::Ordering;

/// Dotted-numeric comparison: a leading `v`/`V` is ignored and missing
/// trailing components count as zero.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left_parts = parse_components(left);
    let right_parts = parse_components(right);
    let length = left_parts.len().max(right_parts.len());

    for index in 0..length {
        let left_value = left_parts.get(index).copied().unwrap_or(0);
        let right_value = right_parts.get(index).copied().unwrap_or(0);
        match left_value.cmp(&right_value) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    Ordering::Equal
}

pub fn is_newer_version(remote: &str, local: &str) -> bool {
    compare_versions(remote, local) == Ordering::Greater
}

pub fn strip_version_prefix(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed)
}

fn parse_components(version: &str) -> Vec<u64> {
    strip_version_prefix(version)
        .split('.')
        .map(|part| {
            let digits: String = part
                .trim()
                .chars()
                .take_while(|character| character.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
