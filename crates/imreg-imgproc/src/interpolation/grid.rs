use imreg_image::ImageError;

/// Create a meshgrid of x and y coordinates computed by a function
///
/// # Arguments
///
/// * `cols` - The number of columns indicating the width of the grid
/// * `rows` - The number of rows indicating the height of the grid
/// * `f` - Maps the integer grid position (x, y) to the sampling coordinates
///
/// # Returns
///
/// A tuple of row-major buffers of length rows * cols containing the x and y coordinates
///
/// # Errors
///
/// The first error returned by `f` is propagated.
pub fn meshgrid_from_fn(
    cols: usize,
    rows: usize,
    f: impl Fn(usize, usize) -> Result<(f32, f32), ImageError>,
) -> Result<(Vec<f32>, Vec<f32>), ImageError> {
    let mut map_x = Vec::with_capacity(rows * cols);
    let mut map_y = Vec::with_capacity(rows * cols);

    for y in 0..rows {
        for x in 0..cols {
            let (u, v) = f(x, y)?;
            map_x.push(u);
            map_y.push(v);
        }
    }

    Ok((map_x, map_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshgrid_identity() -> Result<(), ImageError> {
        let (map_x, map_y) = meshgrid_from_fn(3, 2, |x, y| Ok((x as f32, y as f32)))?;
        assert_eq!(map_x, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert_eq!(map_y, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn meshgrid_error() {
        let res = meshgrid_from_fn(2, 2, |_, _| Err(ImageError::CastError("grid".into())));
        assert!(res.is_err());
    }
}
