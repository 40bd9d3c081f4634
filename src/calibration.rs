//! Camera calibration data and its storage slots.
//!
//! The host computes the camera's intrinsic and extrinsic calibration and stores it
//! on the board, so it travels with the camera.  The board only stores and returns it.
//!
//! Each item is a small row-major `f32` matrix, stored as raw little-endian IEEE-754
//! values at a fixed storage offset.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::{STORAGE_CALIBRATION_WRITE_TIMEOUT_MS, STORAGE_DEFAULT_TIMEOUT_MS, layout};
use crate::storage::Storage;
use crate::{Error, Result};

/// `R` x `C` matrix of `f32`, row-major.  Indices start at 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix<const R: usize, const C: usize> {
    data: [[f32; C]; R],
}

pub type CameraMatrix = Matrix<3, 3>;
pub type DistortionCoefficients = Matrix<1, 5>;
pub type RotationMatrix = Matrix<3, 3>;
pub type TranslationVector = Matrix<1, 3>;

impl<const R: usize, const C: usize> Matrix<R, C> {
    /// Serialized size in bytes
    pub const SIZE: usize = R * C * size_of::<f32>();

    pub const fn new(data: [[f32; C]; R]) -> Self {
        Self { data }
    }

    pub const fn zero() -> Self {
        Self {
            data: [[0.0; C]; R],
        }
    }

    pub const fn rows(&self) -> usize {
        R
    }

    pub const fn cols(&self) -> usize {
        C
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.data.get(row)?.get(col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        let cell = self
            .data
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(Error::InvalidValue)?;
        *cell = value;
        Ok(())
    }

    pub fn row(&self, row: usize) -> Option<[f32; C]> {
        self.data.get(row).copied()
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }
        for (chunk, value) in buf.chunks_exact_mut(4).zip(self.data.iter().flatten()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(Self::SIZE)
    }

    /// Parse from exactly [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(Error::PayloadLength);
        }
        let mut matrix = Self::zero();
        for (value, chunk) in matrix
            .data
            .iter_mut()
            .flatten()
            .zip(bytes.chunks_exact(4))
        {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(matrix)
    }
}

impl<const R: usize, const C: usize> Default for Matrix<R, C> {
    fn default() -> Self {
        Self::zero()
    }
}

/// A calibration item with its own storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationItem {
    CameraMatrix,
    DistortionCoefficients,
    RotationMatrix,
    TranslationVector,
}

impl CalibrationItem {
    /// Storage offset
    pub const fn address(&self) -> u8 {
        match self {
            CalibrationItem::CameraMatrix => layout::CAMERA_MATRIX,
            CalibrationItem::DistortionCoefficients => layout::DISTORTION_COEFFICIENTS,
            CalibrationItem::RotationMatrix => layout::ROTATION_MATRIX,
            CalibrationItem::TranslationVector => layout::TRANSLATION_VECTOR,
        }
    }

    /// Matrix shape, rows by columns
    pub const fn shape(&self) -> (usize, usize) {
        match self {
            CalibrationItem::CameraMatrix => (3, 3),
            CalibrationItem::DistortionCoefficients => (1, 5),
            CalibrationItem::RotationMatrix => (3, 3),
            CalibrationItem::TranslationVector => (1, 3),
        }
    }

    /// Serialized size in bytes
    pub const fn size(&self) -> usize {
        let (rows, cols) = self.shape();
        rows * cols * size_of::<f32>()
    }
}

/// Read an item's raw bytes into the start of `buf`.  Returns the number of bytes
/// read.
pub fn load<S: Storage + ?Sized>(
    storage: &mut S,
    item: CalibrationItem,
    buf: &mut [u8],
) -> Result<usize> {
    let size = item.size();
    let dst = buf.get_mut(..size).ok_or(Error::BufferTooSmall)?;
    debug!("Loading {item:?} from {:#04X}", item.address());
    storage
        .read(item.address(), dst, STORAGE_DEFAULT_TIMEOUT_MS)
        .inspect_err(|e| warn!("Loading {item:?} failed: {e}"))?;
    Ok(size)
}

/// Write an item's raw bytes.  `data` must be exactly the item's size.
pub fn store<S: Storage + ?Sized>(
    storage: &mut S,
    item: CalibrationItem,
    data: &[u8],
) -> Result<()> {
    if data.len() != item.size() {
        warn!(
            "Storing {item:?}: expected {} bytes, got {}",
            item.size(),
            data.len()
        );
        return Err(Error::PayloadLength);
    }
    debug!("Storing {item:?} at {:#04X}", item.address());
    storage
        .write(item.address(), data, STORAGE_CALIBRATION_WRITE_TIMEOUT_MS)
        .inspect_err(|e| warn!("Storing {item:?} failed: {e}"))
}

/// Load an item as a matrix.  The matrix shape must match the item.
pub fn load_matrix<S: Storage + ?Sized, const R: usize, const C: usize>(
    storage: &mut S,
    item: CalibrationItem,
) -> Result<Matrix<R, C>> {
    if item.shape() != (R, C) {
        return Err(Error::InvalidOperation);
    }
    let mut buf = [0; 64];
    let size = load(storage, item, &mut buf)?;
    Matrix::from_bytes(&buf[..size])
}

/// Store a matrix as an item.  The matrix shape must match the item.
pub fn store_matrix<S: Storage + ?Sized, const R: usize, const C: usize>(
    storage: &mut S,
    item: CalibrationItem,
    matrix: &Matrix<R, C>,
) -> Result<()> {
    if item.shape() != (R, C) {
        return Err(Error::InvalidOperation);
    }
    let mut buf = [0; 64];
    let size = matrix.to_bytes(&mut buf)?;
    store(storage, item, &buf[..size])
}
