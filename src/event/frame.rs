//! Frames and the image payload they are logged as

use image::png::PngEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// At most this many images are kept from one image write.
pub const MAX_IMAGE_OUTPUTS: usize = 3;

/// Position of the first image in a blob sequence step (after width and height).
pub const IMAGE_FIELD_INDEX: usize = 2;

/// An RGB frame, `height x width x 3`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap a packed RGB buffer.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` unless `pixels.len() == width * height * 3`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| Error::InvalidInput(format!("frame {width}x{height} is too large")))?;
        if pixels.len() != expected {
            return Err(Error::ShapeMismatch {
                context: "frame".to_string(),
                expected: format!("{height}x{width}x3 = {expected} bytes"),
                actual: format!("{} bytes", pixels.len()),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a frame from `rows[y][x] = [r, g, b]`.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rows are ragged.
    pub fn from_rows(rows: &[Vec<[u8; 3]>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(y) = rows.iter().position(|row| row.len() != width) {
            return Err(Error::ShapeMismatch {
                context: format!("frame row {y}"),
                expected: format!("{width} pixels"),
                actual: format!("{} pixels", rows[y].len()),
            });
        }
        let to_u32 = |n: usize| {
            u32::try_from(n).map_err(|_| Error::InvalidInput(format!("frame dimension {n} exceeds u32")))
        };
        let pixels = rows.iter().flatten().flatten().copied().collect();
        Self::new(to_u32(width)?, to_u32(rows.len())?, pixels)
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB bytes.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Flatten to a feature vector (`H*W*3` values), as fed to the projection.
    #[must_use]
    pub fn to_features(&self) -> Vec<f64> {
        self.pixels.iter().map(|&p| f64::from(p)).collect()
    }

    /// Encode as PNG.
    ///
    /// # Errors
    ///
    /// Returns `ImageEncoding` if the encoder rejects the buffer.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .encode(&self.pixels, self.width, self.height, ColorType::Rgb8)
            .map_err(|e| Error::ImageEncoding(e.to_string()))?;
        Ok(png)
    }
}

/// Image event body: up to [`MAX_IMAGE_OUTPUTS`] PNG frames of one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    width: u32,
    height: u32,
    images: Vec<Vec<u8>>,
}

impl ImagePayload {
    /// Encode a batch of frames, keeping the first [`MAX_IMAGE_OUTPUTS`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty batch or frames of different
    /// shapes, and `ImageEncoding` if PNG encoding fails.
    pub fn encode(frames: &[Frame]) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| Error::InvalidInput("image batch is empty".to_string()))?;
        let kept = &frames[..frames.len().min(MAX_IMAGE_OUTPUTS)];
        if kept
            .iter()
            .any(|f| f.width != first.width || f.height != first.height)
        {
            return Err(Error::InvalidInput(
                "all frames of one image batch must share a shape".to_string(),
            ));
        }
        let images = kept.iter().map(Frame::encode_png).collect::<Result<_>>()?;
        Ok(Self {
            width: first.width,
            height: first.height,
            images,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Encoded images.
    #[must_use]
    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    /// Number of blob fields: width, height, then one per image.
    #[must_use]
    pub fn field_count(&self) -> usize {
        IMAGE_FIELD_INDEX + self.images.len()
    }

    /// Bytes of one blob field.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<Vec<u8>> {
        match index {
            0 => Some(self.width.to_string().into_bytes()),
            1 => Some(self.height.to_string().into_bytes()),
            i => self.images.get(i - IMAGE_FIELD_INDEX).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = rgb.repeat((width * height) as usize);
        Frame::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_frame_size_validated() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        let err = Frame::new(2, 2, vec![0; 11]).unwrap_err();
        assert!(err.to_string().contains("Shape mismatch"));
    }

    #[test]
    fn test_from_rows() {
        let frame = Frame::from_rows(&[vec![[1, 2, 3], [4, 5, 6]]]).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.pixels(), &[1, 2, 3, 4, 5, 6]);
        assert!(Frame::from_rows(&[vec![[0; 3]; 2], vec![[0; 3]]]).is_err());
    }

    #[test]
    fn test_png_encoding() {
        let png = solid(4, 3, [255, 0, 0]).encode_png().unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn test_image_batch_capped() {
        let frames = vec![solid(2, 2, [0, 0, 0]); 5];
        let payload = ImagePayload::encode(&frames).unwrap();
        assert_eq!(payload.images().len(), MAX_IMAGE_OUTPUTS);
        assert_eq!(payload.field_count(), 5);
        assert_eq!(payload.field(0), Some(b"2".to_vec()));
        assert_eq!(payload.field(5), None);
    }

    #[test]
    fn test_image_batch_shape_mismatch() {
        let frames = vec![solid(2, 2, [0, 0, 0]), solid(3, 2, [0, 0, 0])];
        assert!(ImagePayload::encode(&frames).is_err());
        assert!(ImagePayload::encode(&[]).is_err());
    }
}
