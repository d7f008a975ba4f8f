use crate::models::ImageUpload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageUploadOpts {
    pub is_required: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub exact_ratio: bool,
    pub max_kilobytes: usize,
}

impl Default for ImageUploadOpts {
    /// Logo rules: at least 24x24, square, up to 50KB.
    fn default() -> Self {
        Self {
            is_required: false,
            min_width: 24,
            min_height: 24,
            exact_ratio: true,
            max_kilobytes: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Messages describing why `upload` is unacceptable; empty when it is fine.
pub fn image_upload(upload: Option<&ImageUpload>, opts: &ImageUploadOpts) -> Vec<String> {
    let mut messages = Vec::new();

    if opts.is_required {
        let keeps_existing = upload.map(|u| u.bkey.is_some() && !u.remove).unwrap_or(false);
        let has_new = upload.and_then(|u| u.upload.as_ref()).map(|f| !f.content.is_empty()).unwrap_or(false);
        if !keeps_existing && !has_new {
            messages.push("This is required.".to_string());
            return messages;
        }
    }

    let Some(file) = upload.and_then(|u| u.upload.as_ref()).filter(|f| !f.content.is_empty()) else {
        return messages;
    };

    let Some(info) = probe_image(&file.content) else {
        messages.push("This file format not supported.".to_string());
        return messages;
    };

    if info.width < opts.min_width || info.height < opts.min_height {
        messages.push(format!(
            "The image must have minimum dimensions of {}x{} pixels.",
            opts.min_width, opts.min_height
        ));
    }
    if opts.exact_ratio && info.width != info.height {
        messages.push("The image must have an aspect ratio of 1:1.".to_string());
    }
    if opts.max_kilobytes > 0 && file.content.len() > opts.max_kilobytes * 1024 {
        messages.push(format!("The image size must be smaller than {}KB.", opts.max_kilobytes));
    }

    messages
}

/// Reads format and dimensions off the file header without decoding pixels.
pub fn probe_image(bytes: &[u8]) -> Option<ImageInfo> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return probe_png(bytes);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return probe_gif(bytes);
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return probe_jpeg(bytes);
    }
    None
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn probe_png(bytes: &[u8]) -> Option<ImageInfo> {
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let w = bytes.get(16..20)?;
    let h = bytes.get(20..24)?;
    Some(ImageInfo {
        format: ImageFormat::Png,
        width: u32::from_be_bytes([w[0], w[1], w[2], w[3]]),
        height: u32::from_be_bytes([h[0], h[1], h[2], h[3]]),
    })
}

fn probe_gif(bytes: &[u8]) -> Option<ImageInfo> {
    let dims = bytes.get(6..10)?;
    Some(ImageInfo {
        format: ImageFormat::Gif,
        width: u32::from(u16::from_le_bytes([dims[0], dims[1]])),
        height: u32::from(u16::from_le_bytes([dims[2], dims[3]])),
    })
}

fn probe_jpeg(bytes: &[u8]) -> Option<ImageInfo> {
    let mut at = 2;
    loop {
        if *bytes.get(at)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(at + 1)?;
        match marker {
            // fill byte
            0xFF => at += 1,
            // standalone markers carry no length
            0x01 | 0xD0..=0xD7 => at += 2,
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some(ImageInfo {
                    format: ImageFormat::Jpeg,
                    height: be_u16(bytes, at + 5)?,
                    width: be_u16(bytes, at + 7)?,
                });
            }
            _ => at += 2 + be_u16(bytes, at + 2)? as usize,
        }
    }
}
