//! Naming rules shared by the collector, the pipeline, and config validation.
//!
//! Downloaded images are named by their position in the collected URL list,
//! zero-padded to four digits:
//! - index `0` → `0000.jpg`
//! - index `42` → `0042.jpg`
//! - index `12345` → `12345.jpg` (padding is a minimum width, not a cap)
//!
//! The name carries no information about the image itself. The same URL can
//! land on a different index in another run.

/// Extension given to every downloaded file, regardless of actual content.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Format a zero-based index as a 4-digit zero-padded string.
pub fn format_index(index: usize) -> String {
    format!("{:04}", index)
}

/// File name for the image at `index` in a category directory.
pub fn image_file_name(index: usize) -> String {
    format!("{}.{}", format_index(index), IMAGE_EXTENSION)
}

/// Whether `url` starts with an `http://` or `https://` scheme (case-insensitive).
pub fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Whether a category name can be used directly as a directory name under the
/// dataset root.
pub fn is_valid_category_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_index_pads_to_four() {
        assert_eq!(format_index(0), "0000");
        assert_eq!(format_index(7), "0007");
        assert_eq!(format_index(999), "0999");
    }

    #[test]
    fn format_index_wider_than_four() {
        assert_eq!(format_index(12345), "12345");
    }

    #[test]
    fn image_file_name_uses_jpg() {
        assert_eq!(image_file_name(0), "0000.jpg");
        assert_eq!(image_file_name(41), "0041.jpg");
    }

    #[test]
    fn http_scheme_accepted() {
        assert!(has_http_scheme("http://example.com/a.jpg"));
        assert!(has_http_scheme("https://example.com/a.jpg"));
        assert!(has_http_scheme("HTTPS://EXAMPLE.COM/A.JPG"));
    }

    #[test]
    fn non_http_rejected() {
        assert!(!has_http_scheme(""));
        assert!(!has_http_scheme("http"));
        assert!(!has_http_scheme("httpfoo://x"));
        assert!(!has_http_scheme("ftp://example.com/a.jpg"));
        assert!(!has_http_scheme("data:image/png;base64,AAAA"));
        assert!(!has_http_scheme("//cdn.example.com/a.jpg"));
        assert!(!has_http_scheme("/images/a.jpg"));
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert!(!has_http_scheme("ссылка на картинку"));
    }

    #[test]
    fn category_names() {
        assert!(is_valid_category_name("polar bear"));
        assert!(is_valid_category_name("bär"));
        assert!(!is_valid_category_name(""));
        assert!(!is_valid_category_name("   "));
        assert!(!is_valid_category_name("."));
        assert!(!is_valid_category_name(".."));
        assert!(!is_valid_category_name("a/b"));
        assert!(!is_valid_category_name("a\\b"));
    }
}
