use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 100;

/// Build the object key for a photo.
///
/// Format: `events/{code}/{unix_millis}-{suffix}-{filename}`
///
/// The millisecond timestamp keeps keys roughly ordered by upload time, the
/// random suffix separates uploads of the same filename in the same
/// millisecond.
pub fn photo_storage_path(
    event_code: &str,
    filename: &str,
    uploaded_at: DateTime<Utc>,
    suffix: &str,
) -> String {
    format!(
        "events/{code}/{millis}-{suffix}-{name}",
        code = event_code,
        millis = uploaded_at.timestamp_millis(),
        suffix = suffix,
        name = sanitize_filename(filename),
    )
}

/// [`photo_storage_path`] with the current time and a fresh random suffix
pub fn new_storage_path(event_code: &str, filename: &str) -> String {
    let suffix = random_suffix(&mut rand::thread_rng());
    photo_storage_path(event_code, filename, Utc::now(), &suffix)
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Sanitize a client filename for use inside an object key.
///
/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else (path
/// separators included) becomes `_`. Leading dots are dropped so a name can
/// never be `.` or `..`.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .skip_while(|c| *c == '.')
        .take(MAX_FILENAME_LEN)
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_photo_storage_path() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap();
        let path = photo_storage_path("ABC123", "IMG 0001.jpg", at, "x1y2z3w4");
        assert_eq!(
            path,
            format!("events/ABC123/{}-x1y2z3w4-IMG_0001.jpg", at.timestamp_millis())
        );
    }

    #[test]
    fn test_new_storage_paths_differ() {
        let first = new_storage_path("ABC123", "cake.jpg");
        let second = new_storage_path("ABC123", "cake.jpg");
        assert!(first.starts_with("events/ABC123/"));
        assert!(first.ends_with("-cake.jpg"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("beach-day_1.png"), "beach-day_1.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("été.jpg"), "_t_.jpg");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), MAX_FILENAME_LEN);
    }
}
