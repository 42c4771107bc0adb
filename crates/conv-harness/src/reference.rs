//! Trusted 2D convolution with zero padding.
//!
//! ```text
//! out[i][j] = Σ_ki Σ_kj in[i + ki - kH/2][j + kj - kW/2] * k[ki][kj]
//! ```
//!
//! Out-of-range input positions contribute zero. The kernel is not
//! flipped (this is the correlation form used by the external program),
//! and the output always has the input's shape, for any kernel size.

use crate::matrix::Matrix;

/// Zero-padded "same" convolution of `input` with `kernel`.
pub fn convolve(input: &Matrix, kernel: &Matrix) -> Matrix {
    let mut out = Matrix::zeros_like(input);
    for i in 0..input.rows() {
        for j in 0..input.cols() {
            out.set(i, j, convolve_element(input, kernel, i, j));
        }
    }
    out
}

/// A single output element at `(i, j)`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn convolve_element(input: &Matrix, kernel: &Matrix, i: usize, j: usize) -> f64 {
    let (h, w) = input.shape();
    let (kh, kw) = kernel.shape();
    let pad_h = (kh / 2) as isize;
    let pad_w = (kw / 2) as isize;

    let mut sum = 0.0_f64;
    for ki in 0..kh {
        let ii = i as isize + ki as isize - pad_h;
        if ii < 0 || ii >= h as isize {
            continue;
        }
        for kj in 0..kw {
            let jj = j as isize + kj as isize - pad_w;
            if jj < 0 || jj >= w as isize {
                continue;
            }
            sum += input.get(ii as usize, jj as usize) * kernel.get(ki, kj);
        }
    }
    sum
}

/// Whether the whole kernel footprint centred on `(i, j)` lies inside
/// an `h x w` grid, i.e. no zero padding is involved at that cell.
pub fn is_interior(h: usize, w: usize, kh: usize, kw: usize, i: usize, j: usize) -> bool {
    let (top, left) = (kh / 2, kw / 2);
    let (bottom, right) = (kh - 1 - top, kw - 1 - left);
    i >= top && j >= left && i + bottom < h && j + right < w
}
