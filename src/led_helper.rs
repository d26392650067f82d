use serde::Serialize;
use thiserror::Error;

use crate::color::Pixel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("LED index {index} out of range (chain has {chain_count} LEDs)")]
pub struct IndexError {
    pub index: usize,
    pub chain_count: usize,
}

/// Introspection snapshot of the chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedStatus {
    pub color_data: Vec<Pixel>,
}

/// Current color of every LED in the chain
#[derive(Debug, Clone)]
pub struct LedHelper {
    color_data: Vec<Pixel>,
}

impl LedHelper {
    pub fn new(chain_count: usize, initial: Pixel) -> Self {
        LedHelper {
            color_data: vec![initial; chain_count],
        }
    }

    pub fn chain_count(&self) -> usize {
        self.color_data.len()
    }

    pub fn color_data(&self) -> &[Pixel] {
        &self.color_data
    }

    /// Set one LED (1-based `index`) or, with `None`, the whole chain
    pub fn set_color(&mut self, index: Option<usize>, color: Pixel) -> Result<(), IndexError> {
        match index {
            None => self.color_data.fill(color),
            Some(index) => {
                let chain_count = self.chain_count();
                let slot = index
                    .checked_sub(1)
                    .and_then(|i| self.color_data.get_mut(i))
                    .ok_or(IndexError { index, chain_count })?;
                *slot = color;
            }
        }
        Ok(())
    }

    /// Replace the whole chain state. Extra pixels are ignored.
    pub fn replace(&mut self, pixels: &[Pixel]) {
        for (slot, pixel) in self.color_data.iter_mut().zip(pixels) {
            *slot = *pixel;
        }
    }

    pub fn status(&self) -> LedStatus {
        LedStatus {
            color_data: self.color_data.clone(),
        }
    }
}
