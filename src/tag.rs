// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Best-effort audio tag touch-ups for staged episodes.
//!
//! The device shows whatever the title frame says, and some feeds ship
//! episodes with no tag at all. Staging asks this capability to fill the
//! title in (only when absent) and to embed a cover (only when the feed
//! provided one and it fits the size cap). The `Tagger` trait keeps the
//! staging logic testable without touching real tag data.

use crate::error::TagError;

/// Covers larger than this are not embedded; the device only renders
/// thumbnails anyway
const MAX_COVER_BYTES: usize = 512 * 1024;

/// Capability interface for the tag touch-ups staging performs
pub trait Tagger: Send + Sync {
    /// Write `title` into the audio's title frame when none is present.
    /// Returns the rewritten bytes, or `None` when the audio already has
    /// a title.
    fn ensure_title(&self, audio: &[u8], title: &str) -> Result<Option<Vec<u8>>, TagError>;

    /// Embed `image` as the front cover when the audio has none and the
    /// image fits the size cap. Returns the rewritten bytes, or `None`
    /// when nothing was embedded.
    fn normalize_cover(&self, audio: &[u8], image: &[u8]) -> Result<Option<Vec<u8>>, TagError>;
}

/// Tagger that never touches anything; for tests and `--no-tag` runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTagger;

impl Tagger for NoopTagger {
    fn ensure_title(&self, _audio: &[u8], _title: &str) -> Result<Option<Vec<u8>>, TagError> {
        Ok(None)
    }

    fn normalize_cover(&self, _audio: &[u8], _image: &[u8]) -> Result<Option<Vec<u8>>, TagError> {
        Ok(None)
    }
}

/// Minimal ID3v2 reader/writer: enough to check for a frame and to splice
/// one in. Anything fancier (v2.2 writes, extended headers) is declined
/// and the enhancement skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct Id3Tagger;

impl Tagger for Id3Tagger {
    fn ensure_title(&self, audio: &[u8], title: &str) -> Result<Option<Vec<u8>>, TagError> {
        if has_frame(audio, b"TIT2", b"TT2")? {
            return Ok(None);
        }
        let frame = text_frame(*b"TIT2", title);
        Ok(Some(insert_frame(audio, &frame)?))
    }

    fn normalize_cover(&self, audio: &[u8], image: &[u8]) -> Result<Option<Vec<u8>>, TagError> {
        if image.is_empty() || image.len() > MAX_COVER_BYTES {
            return Ok(None);
        }
        let Some(mime) = image_mime(image) else {
            return Ok(None);
        };
        if has_frame(audio, b"APIC", b"PIC")? {
            return Ok(None);
        }
        let frame = picture_frame(mime, image);
        Ok(Some(insert_frame(audio, &frame)?))
    }
}

struct TagHeader {
    major: u8,
    /// Size of the frame area, excluding the 10-byte header
    size: usize,
}

fn parse_header(audio: &[u8]) -> Result<Option<TagHeader>, TagError> {
    if audio.len() < 10 || &audio[0..3] != b"ID3" {
        return Ok(None);
    }
    let major = audio[3];
    let flags = audio[5];
    if flags & 0x40 != 0 {
        return Err(TagError::ExtendedHeader);
    }
    let size = decode_syncsafe([audio[6], audio[7], audio[8], audio[9]]) as usize;
    if audio.len() < 10 + size {
        return Err(TagError::Truncated { offset: audio.len() });
    }
    Ok(Some(TagHeader { major, size }))
}

/// Whether the tag carries the given frame (`v22_id` for ID3v2.2 tags)
fn has_frame(audio: &[u8], id: &[u8; 4], v22_id: &[u8; 3]) -> Result<bool, TagError> {
    let Some(header) = parse_header(audio)? else {
        return Ok(false);
    };

    let frames = &audio[10..10 + header.size];
    let mut offset = 0;

    if header.major == 2 {
        while offset + 6 <= frames.len() {
            let fid = &frames[offset..offset + 3];
            if fid[0] == 0 {
                break;
            }
            let size = u32::from_be_bytes([
                0,
                frames[offset + 3],
                frames[offset + 4],
                frames[offset + 5],
            ]) as usize;
            if fid == v22_id {
                return Ok(true);
            }
            offset += 6 + size;
        }
        return Ok(false);
    }

    if header.major != 3 && header.major != 4 {
        return Err(TagError::UnsupportedVersion {
            major: header.major,
        });
    }

    while offset + 10 <= frames.len() {
        let fid = &frames[offset..offset + 4];
        if fid[0] == 0 {
            break;
        }
        let raw = [
            frames[offset + 4],
            frames[offset + 5],
            frames[offset + 6],
            frames[offset + 7],
        ];
        let size = if header.major == 4 {
            decode_syncsafe(raw) as usize
        } else {
            u32::from_be_bytes(raw) as usize
        };
        if fid == id {
            return Ok(true);
        }
        offset += 10 + size;
    }
    Ok(false)
}

/// Splice a finished frame into the tag, right after the header; audio
/// without a tag gets a fresh ID3v2.3 one.
fn insert_frame(audio: &[u8], frame: &[u8]) -> Result<Vec<u8>, TagError> {
    match parse_header(audio)? {
        None => {
            let mut out = Vec::with_capacity(10 + frame.len() + audio.len());
            out.extend_from_slice(b"ID3");
            out.push(3);
            out.push(0);
            out.push(0);
            out.extend_from_slice(&encode_syncsafe(frame.len() as u32));
            out.extend_from_slice(frame);
            out.extend_from_slice(audio);
            Ok(out)
        }
        Some(header) => {
            if header.major != 3 && header.major != 4 {
                return Err(TagError::UnsupportedVersion {
                    major: header.major,
                });
            }
            // Frames are built v2.3-style; a v2.4 host tag needs the
            // size field re-encoded as syncsafe
            let frame = reencode_frame_size(frame, header.major);
            let mut out = Vec::with_capacity(audio.len() + frame.len());
            out.extend_from_slice(&audio[..6]);
            out.extend_from_slice(&encode_syncsafe((header.size + frame.len()) as u32));
            out.extend_from_slice(&frame);
            out.extend_from_slice(&audio[10..]);
            Ok(out)
        }
    }
}

/// Frames are built with v2.3 big-endian sizes; rewrite to syncsafe for
/// a v2.4 host tag
fn reencode_frame_size(frame: &[u8], major: u8) -> Vec<u8> {
    let mut out = frame.to_vec();
    if major == 4 {
        let size = (frame.len() - 10) as u32;
        out[4..8].copy_from_slice(&encode_syncsafe(size));
    }
    out
}

/// A v2.3 text frame: latin-1 when it fits, UTF-16 with BOM otherwise
fn text_frame(id: [u8; 4], text: &str) -> Vec<u8> {
    let body = if text.is_ascii() {
        let mut body = Vec::with_capacity(1 + text.len());
        body.push(0u8);
        body.extend_from_slice(text.as_bytes());
        body
    } else {
        let mut body = vec![1u8, 0xFF, 0xFE];
        for unit in text.encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        body
    };
    finish_frame(id, body)
}

/// A v2.3 APIC frame marked as front cover
fn picture_frame(mime: &str, image: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(image.len() + mime.len() + 4);
    body.push(0u8);
    body.extend_from_slice(mime.as_bytes());
    body.push(0);
    body.push(0x03);
    body.push(0);
    body.extend_from_slice(image);
    finish_frame(*b"APIC", body)
}

fn finish_frame(id: [u8; 4], body: Vec<u8>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(10 + body.len());
    frame.extend_from_slice(&id);
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&body);
    frame
}

fn image_mime(image: &[u8]) -> Option<&'static str> {
    if image.starts_with(&[0xFF, 0xD8]) {
        Some("image/jpeg")
    } else if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else {
        None
    }
}

fn decode_syncsafe(bytes: [u8; 4]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

fn encode_syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}
