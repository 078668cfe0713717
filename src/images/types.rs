use crate::models::CoverSource;

/// Edge length of every persisted cover, in pixels
pub const COVER_SIZE: u32 = 300;

/// Last.fm image size labels, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageSize {
    Small,
    Medium,
    Large,
    ExtraLarge, // 300x300 from Last.fm
    Mega,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Small => "small",
            ImageSize::Medium => "medium",
            ImageSize::Large => "large",
            ImageSize::ExtraLarge => "extralarge",
            ImageSize::Mega => "mega",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "small" => Some(ImageSize::Small),
            "medium" => Some(ImageSize::Medium),
            "large" => Some(ImageSize::Large),
            "extralarge" => Some(ImageSize::ExtraLarge),
            "mega" => Some(ImageSize::Mega),
            _ => None,
        }
    }
}

/// A normalized JPEG ready to be written, with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub bytes: Vec<u8>,
    pub source: CoverSource,
    pub source_url: Option<String>,
}

impl ResolvedImage {
    pub fn new(bytes: Vec<u8>, source: CoverSource, source_url: Option<String>) -> Self {
        Self {
            bytes,
            source,
            source_url,
        }
    }
}
