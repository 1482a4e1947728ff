/// Directory (inside the media root) holding generated poster frames.
///
/// The leading underscore keeps it from ever matching the numeric folder pattern.
pub const THUMBS_FOLDER_NAME: &str = "_thumbs";

/// How many leading bytes are read when sniffing a file's content type.
pub(crate) const SNIFF_LEN: usize = 8192;

/// Length of the hex fingerprint used in poster file names.
pub(crate) const FINGERPRINT_HEX_LEN: usize = 16;
