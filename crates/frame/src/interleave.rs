//! Interleaving for burst error mitigation

use crate::{FrameError, Result};

/// Generic interleaver trait
pub trait Interleaver {
    /// Interleave data to spread errors
    fn interleave(&mut self, data: &[u8]) -> Result<Vec<u8>>;
    
    /// Deinterleave data to concentrate errors
    fn deinterleave(&mut self, data: &[u8]) -> Result<Vec<u8>>;
    
    /// Reset interleaver state
    fn reset(&mut self);
}

/// Block interleaver implementation
pub struct BlockInterleaver {
    rows: usize,
    cols: usize,
}

impl BlockInterleaver {
    /// Create a new block interleaver
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(FrameError::InterleavingError {
                msg: "Interleaver dimensions must be greater than 0".to_string(),
            });
        }
        
        Ok(Self { rows, cols })
    }
    
    /// Get the block size (total elements)
    pub fn block_size(&self) -> usize {
        self.rows * self.cols
    }
}

impl Interleaver for BlockInterleaver {
    fn interleave(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let block_size = self.block_size();
        
        if data.len() % block_size != 0 {
            return Err(FrameError::InterleavingError {
                msg: format!("Data length {} not multiple of block size {}", data.len(), block_size),
            });
        }
        
        let mut result = Vec::with_capacity(data.len());
        
        // Process data in blocks
        for block_start in (0..data.len()).step_by(block_size) {
            let block_end = block_start + block_size;
            let block = &data[block_start..block_end];
            
            // Write data row by row, read column by column
            for col in 0..self.cols {
                for row in 0..self.rows {
                    let index = row * self.cols + col;
                    result.push(block[index]);
                }
            }
        }
        
        Ok(result)
    }
    
    fn deinterleave(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let block_size = self.block_size();
        
        if data.len() % block_size != 0 {
            return Err(FrameError::InterleavingError {
                msg: format!("Data length {} not multiple of block size {}", data.len(), block_size),
            });
        }
        
        let mut result = Vec::with_capacity(data.len());
        
        // Process data in blocks
        for block_start in (0..data.len()).step_by(block_size) {
            let block_end = block_start + block_size;
            let block = &data[block_start..block_end];
            
            // Create temporary matrix
            let mut matrix = vec![vec![0u8; self.cols]; self.rows];
            
            // Fill matrix column by column
            let mut index = 0;
            for col in 0..self.cols {
                for row in 0..self.rows {
                    matrix[row][col] = block[index];
                    index += 1;
                }
            }
            
            // Read matrix row by row
            for row in 0..self.rows {
                for col in 0..self.cols {
                    result.push(matrix[row][col]);
                }
            }
        }
        
        Ok(result)
    }
    
    fn reset(&mut self) {
        // Block interleaver is stateless
    }
}

/// OFDM time/frequency interleaver: a twisted block interleave over the
/// Nc x Nsymb data-cell grid, row r col c -> (r, (c + r*stride) mod Nc),
/// decorrelating burst errors across both axes.
pub struct OfdmInterleaver {
    rows: usize,
    cols: usize,
    stride: usize,
}

impl OfdmInterleaver {
    pub fn new(rows: usize, cols: usize, stride: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(FrameError::InterleavingError {
                msg: "OFDM interleaver dimensions must be greater than 0".to_string(),
            });
        }
        Ok(Self { rows, cols, stride })
    }

    fn twisted_col(&self, row: usize, col: usize) -> usize {
        (col + row * self.stride) % self.cols
    }

    /// Interleave one frame's worth of data cells (length rows*cols),
    /// ordered row-major.
    pub fn interleave<T: Copy + Default>(&self, cells: &[T]) -> Result<Vec<T>> {
        let total = self.rows * self.cols;
        if cells.len() != total {
            return Err(FrameError::InterleavingError {
                msg: format!("expected {} cells, got {}", total, cells.len()),
            });
        }
        let mut out = vec![T::default(); total];
        for row in 0..self.rows {
            for col in 0..self.cols {
                let dst_col = self.twisted_col(row, col);
                out[row * self.cols + dst_col] = cells[row * self.cols + col];
            }
        }
        Ok(out)
    }

    /// Inverse of `interleave`.
    pub fn deinterleave<T: Copy + Default>(&self, cells: &[T]) -> Result<Vec<T>> {
        let total = self.rows * self.cols;
        if cells.len() != total {
            return Err(FrameError::InterleavingError {
                msg: format!("expected {} cells, got {}", total, cells.len()),
            });
        }
        let mut out = vec![T::default(); total];
        for row in 0..self.rows {
            for col in 0..self.cols {
                let src_col = self.twisted_col(row, col);
                out[row * self.cols + col] = cells[row * self.cols + src_col];
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ofdm_interleaver_roundtrip() {
        let interleaver = OfdmInterleaver::new(4, 6, 2).unwrap();
        let data: Vec<i32> = (0..24).collect();
        let interleaved = interleaver.interleave(&data).unwrap();
        let recovered = interleaver.deinterleave(&interleaved).unwrap();
        assert_eq!(data, recovered);
    }

    #[test]
    fn test_ofdm_interleaver_actually_permutes() {
        let interleaver = OfdmInterleaver::new(4, 6, 2).unwrap();
        let data: Vec<i32> = (0..24).collect();
        let interleaved = interleaver.interleave(&data).unwrap();
        assert_ne!(data, interleaved);
    }

    #[test]
    fn test_block_interleaver_creation() {
        let interleaver = BlockInterleaver::new(4, 8).unwrap();
        assert_eq!(interleaver.rows, 4);
        assert_eq!(interleaver.cols, 8);
        assert_eq!(interleaver.block_size(), 32);
    }

    #[test]
    fn test_block_interleaver_roundtrip() {
        let mut interleaver = BlockInterleaver::new(2, 4).unwrap();
        let data = vec![0, 1, 2, 3, 4, 5, 6, 7];
        
        let interleaved = interleaver.interleave(&data).unwrap();
        let deinterleaved = interleaver.deinterleave(&interleaved).unwrap();
        
        assert_eq!(data, deinterleaved);
    }

    #[test]
    fn test_block_interleaver_pattern() {
        let mut interleaver = BlockInterleaver::new(2, 2).unwrap();
        let data = vec![0, 1, 2, 3];
        
        let interleaved = interleaver.interleave(&data).unwrap();
        // Expected: [0, 2, 1, 3] (read column-wise)
        assert_eq!(interleaved, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(BlockInterleaver::new(0, 4).is_err());
        assert!(OfdmInterleaver::new(0, 4, 1).is_err());
    }
}