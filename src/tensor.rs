//! Dense tensors carried by tensor events
//!
//! Storage is row-major. Only two element types occur in the log: floats
//! (probabilities, weights, histograms, probe tables) and UTF-8 strings
//! (the action meaning table).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Element storage of a [`Tensor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum TensorData {
    /// Numeric elements
    Float(Vec<f64>),
    /// String elements
    Text(Vec<String>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            Self::Float(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }
}

/// N-dimensional array with a row-major layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor from an explicit shape.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the element count does not match the shape.
    pub fn from_shape(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ShapeMismatch {
                context: "tensor".to_string(),
                expected: format!("{expected} elements for shape {shape:?}"),
                actual: format!("{} elements", data.len()),
            });
        }
        Ok(Self { shape, data })
    }

    /// 1-D float tensor.
    #[must_use]
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: TensorData::Float(values),
        }
    }

    /// 1-D string tensor.
    #[must_use]
    pub fn text(values: Vec<String>) -> Self {
        Self {
            shape: vec![values.len()],
            data: TensorData::Text(values),
        }
    }

    /// 2-D float tensor from rows.
    ///
    /// An empty row list gives a `0 x 0` matrix.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rows are ragged.
    pub fn matrix(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(Error::ShapeMismatch {
                context: format!("matrix row {index}"),
                expected: format!("{cols} columns"),
                actual: format!("{} columns", row.len()),
            });
        }
        Ok(Self {
            shape: vec![rows.len(), cols],
            data: TensorData::Float(rows.concat()),
        })
    }

    /// Dimensions.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element storage.
    #[must_use]
    pub const fn data(&self) -> &TensorData {
        &self.data
    }

    /// Float elements, if this is a numeric tensor.
    #[must_use]
    pub fn as_floats(&self) -> Option<&[f64]> {
        match &self.data {
            TensorData::Float(values) => Some(values),
            TensorData::Text(_) => None,
        }
    }

    /// String elements, if this is a text tensor.
    #[must_use]
    pub fn as_text(&self) -> Option<&[String]> {
        match &self.data {
            TensorData::Text(values) => Some(values),
            TensorData::Float(_) => None,
        }
    }

    /// Rows of a 2-D float tensor.
    #[must_use]
    pub fn rows(&self) -> Option<Vec<&[f64]>> {
        let &[rows, cols] = self.shape.as_slice() else {
            return None;
        };
        let values = self.as_floats()?;
        if cols == 0 {
            return Some(vec![&[][..]; rows]);
        }
        Some(values.chunks_exact(cols).collect())
    }

    /// One column of a 2-D float tensor.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        let &[_, cols] = self.shape.as_slice() else {
            return None;
        };
        if index >= cols {
            return None;
        }
        Some(self.rows()?.iter().map(|row| row[index]).collect())
    }
}
