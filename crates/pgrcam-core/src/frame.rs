//! Frame shape inference and buffer access
//!
//! The pixel format is not surfaced to callers, so the row stride is the
//! only signal for layout: `stride == cols` means one 8-bit channel,
//! anything else means three interleaved channels.
//!
//! Host dimensions are reported in column-major order, matching the
//! scripting host: mono frames are `[cols, rows]` and color frames are
//! `[3, cols, rows]`. The equivalent row-major ndarray shapes are
//! `(rows, cols)` and `(rows, cols, 3)`.
//!
//! Two ways out of an [`crate::Image`]:
//!
//! - [`FrameView`] borrows the SDK buffer (zero-copy). It borrows the image,
//!   so the next retrieve cannot run while a view is alive.
//! - [`Frame`] owns exactly `rows * stride` copied bytes and stays valid
//!   forever. This is what crosses the C boundary.

use ndarray::{ArrayView2, ArrayView3, ArrayViewD, ShapeBuilder};

use crate::error::{CaptureError, ErrorCode, Operation, Result};
use crate::types::ImageHeader;

/// Channels in an interleaved color frame.
pub const COLOR_CHANNELS: usize = 3;

/// Array shape inferred from a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    Mono { cols: usize, rows: usize },
    Color { cols: usize, rows: usize },
}

impl FrameShape {
    pub fn infer(header: &ImageHeader) -> Self {
        let cols = header.cols as usize;
        let rows = header.rows as usize;
        if header.stride == header.cols {
            FrameShape::Mono { cols, rows }
        } else {
            FrameShape::Color { cols, rows }
        }
    }

    /// Host (column-major) dimensions.
    pub fn dims(&self) -> Vec<usize> {
        match *self {
            FrameShape::Mono { cols, rows } => vec![cols, rows],
            FrameShape::Color { cols, rows } => vec![COLOR_CHANNELS, cols, rows],
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            FrameShape::Mono { .. } => 2,
            FrameShape::Color { .. } => 3,
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self, FrameShape::Color { .. })
    }
}

/// Zero-copy view of the frame currently held by an image.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    header: ImageHeader,
    shape: FrameShape,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap the first `rows * stride` bytes of an SDK buffer.
    pub fn new(header: ImageHeader, buffer: &'a [u8]) -> Result<Self> {
        let len = header.frame_len();
        let data = buffer.get(..len).ok_or_else(|| CaptureError::Capture {
            context: format!(
                "{}: buffer holds {} bytes, frame needs {}",
                Operation::RetrieveBuffer,
                buffer.len(),
                len
            ),
            code: ErrorCode::IMAGE_CONSISTENCY_ERROR,
        })?;
        Ok(Self {
            header,
            shape: FrameShape::infer(&header),
            data,
        })
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Row-major array view honoring the row stride.
    pub fn array(&self) -> Result<ArrayViewD<'a, u8>> {
        array_view(self.shape, self.header.stride as usize, self.data)
    }

    /// Copy the frame out of the SDK buffer.
    pub fn to_frame(&self) -> Frame {
        Frame {
            header: self.header,
            shape: self.shape,
            data: self.data.to_vec(),
        }
    }
}

/// Frame copied out of the SDK buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: ImageHeader,
    shape: FrameShape,
    data: Vec<u8>,
}

impl Frame {
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn array(&self) -> Result<ArrayViewD<'_, u8>> {
        array_view(self.shape, self.header.stride as usize, &self.data)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn array_view(shape: FrameShape, stride: usize, data: &[u8]) -> Result<ArrayViewD<'_, u8>> {
    let view = match shape {
        FrameShape::Mono { cols, rows } => {
            ArrayView2::from_shape((rows, cols).strides((stride, 1)), data).map(|a| a.into_dyn())
        }
        FrameShape::Color { cols, rows } => ArrayView3::from_shape(
            (rows, cols, COLOR_CHANNELS).strides((stride, COLOR_CHANNELS, 1)),
            data,
        )
        .map(|a| a.into_dyn()),
    };
    view.map_err(|e| CaptureError::Capture {
        context: format!("frame does not fit a {}-D array: {}", shape.ndim(), e),
        code: ErrorCode::IMAGE_CONSISTENCY_ERROR,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::PixelFormat;

    fn header(cols: u32, rows: u32, stride: u32) -> ImageHeader {
        ImageHeader {
            rows,
            cols,
            stride,
            data_size: rows * stride,
            received_data_size: rows * stride,
            format: PixelFormat::Other(0),
            bayer_format: 0,
        }
    }

    #[test]
    fn test_mono_shape_law() {
        let shape = FrameShape::infer(&header(640, 480, 640));
        assert_eq!(shape.dims(), vec![640, 480]);
        assert_eq!(shape.ndim(), 2);
    }

    #[test]
    fn test_color_shape_law() {
        let shape = FrameShape::infer(&header(640, 480, 1920));
        assert_eq!(shape.dims(), vec![3, 640, 480]);
        assert!(shape.is_color());
    }

    #[test]
    fn test_view_takes_exactly_rows_times_stride() {
        let buffer = vec![7u8; 4 * 3 + 10];
        let view = FrameView::new(header(4, 3, 4), &buffer).unwrap();
        assert_eq!(view.bytes().len(), 12);
        assert_eq!(view.to_frame().bytes().len(), 12);
    }

    #[test]
    fn test_view_rejects_short_buffer() {
        let buffer = vec![0u8; 11];
        let err = FrameView::new(header(4, 3, 4), &buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capture);
    }

    #[test]
    fn test_mono_array_is_row_major() {
        let buffer: Vec<u8> = (0..12).collect();
        let view = FrameView::new(header(4, 3, 4), &buffer).unwrap();
        let array = view.array().unwrap();
        assert_eq!(array.shape(), &[3, 4]);
        assert_eq!(array[[1, 2]], 6);
    }

    #[test]
    fn test_color_array_skips_row_padding() {
        // 2 columns of RGB plus 2 padding bytes per row
        let stride = 8;
        let mut buffer = vec![0xEEu8; 2 * stride];
        for row in 0..2 {
            for i in 0..6 {
                buffer[row * stride + i] = (row * 10 + i) as u8;
            }
        }
        let frame = FrameView::new(header(2, 2, stride as u32), &buffer)
            .unwrap()
            .to_frame();
        let array = frame.array().unwrap();
        assert_eq!(array.shape(), &[2, 2, 3]);
        assert_eq!(array[[1, 1, 2]], 15);
        assert!(array.iter().all(|&b| b != 0xEE));
    }

    #[test]
    fn test_color_heuristic_with_narrow_stride_fails_array() {
        // stride between cols and 3*cols cannot hold interleaved RGB
        let buffer = vec![0u8; 8 * 2];
        let view = FrameView::new(header(4, 2, 8), &buffer).unwrap();
        assert_eq!(view.shape().dims(), vec![3, 4, 2]);
        assert!(view.array().is_err());
    }
}
