use std::ops::Range;

use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use imreg::{
    estimate_transform, register, register_with_config, AffineRegistration, ImageRole,
    PerspectiveRegistration, RegistrationConfig, RegistrationError, RegistrationType,
};
use imreg_geometry::TransformMatrix;
use imreg_image::{Image, ImageError, ImageSize};

const BLOCK: usize = 8;

/// Random 8x8 blocks. Every 8x8 group of blocks holds a black and a white block, so any
/// block aligned crop larger than 64 pixels spans the full intensity range.
fn texture(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let (bw, bh) = (width / BLOCK + 1, height / BLOCK + 1);
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks: Vec<u8> = (0..bw * bh)
        .map(|i| match (i % bw % 8, i / bw % 8) {
            (0, 0) => 0,
            (4, 4) => 255,
            _ => rng.random_range(1..=254),
        })
        .collect();

    (0..width * height)
        .map(|i| blocks[(i / width / BLOCK) * bw + (i % width) / BLOCK])
        .collect()
}

/// Crop a `size` window at `(x0, y0)` out of a `width` wide texture.
fn crop(data: &[u8], width: usize, x0: usize, y0: usize, size: usize) -> Vec<u8> {
    (0..size * size)
        .map(|i| data[(y0 + i / size) * width + x0 + i % size])
        .collect()
}

const TEXTURE_SIZE: usize = 384;
const CROP_SIZE: usize = 256;

fn crop_image(x0: usize, y0: usize) -> Result<Image<u8, 1>, ImageError> {
    let data = texture(TEXTURE_SIZE, TEXTURE_SIZE, 42);
    Image::new(
        ImageSize {
            width: CROP_SIZE,
            height: CROP_SIZE,
        },
        crop(&data, TEXTURE_SIZE, x0, y0, CROP_SIZE),
    )
}

/// Master at `(32, 32)` and slave shifted by `(dx, dy)`: slave `p` maps to master `p + (dx, dy)`.
fn shifted_pair(dx: usize, dy: usize) -> Result<(Image<u8, 1>, Image<u8, 1>), ImageError> {
    Ok((crop_image(32, 32)?, crop_image(32 + dx, 32 + dy)?))
}

fn mean_abs_diff(
    a: &Image<u8, 1>,
    b: &Image<u8, 1>,
    x_range: Range<usize>,
    y_range: Range<usize>,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0;
    for y in y_range {
        for x in x_range.clone() {
            let (va, vb) = (a.as_slice()[y * a.cols() + x], b.as_slice()[y * b.cols() + x]);
            sum += (va as f64 - vb as f64).abs();
            count += 1;
        }
    }
    sum / count as f64
}

fn assert_translation(transform: &TransformMatrix, dx: f64, dy: f64, tolerance: f64) {
    for p in [[10.0, 10.0], [240.0, 20.0], [30.0, 230.0], [200.0, 200.0]] {
        let q = transform.transform_point(&p);
        assert_relative_eq!(q[0], p[0] + dx, epsilon = tolerance);
        assert_relative_eq!(q[1], p[1] + dy, epsilon = tolerance);
    }
}

#[test]
fn affine_identity() -> Result<(), RegistrationError> {
    let master = crop_image(0, 0)?;
    let slave = master.clone();

    let registration = register_with_config(&master, &slave, &RegistrationConfig::default())?;

    let TransformMatrix::Affine(affine) = registration.estimate.transform else {
        panic!("expected an affine transform");
    };
    let expected = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    for i in 0..2 {
        for j in 0..3 {
            assert_relative_eq!(affine.matrix()[i][j], expected[i][j], epsilon = 1e-6);
        }
    }

    assert_eq!(registration.image.size(), master.size());
    let diff = mean_abs_diff(&registration.image, &master, 1..CROP_SIZE - 1, 1..CROP_SIZE - 1);
    assert!(diff < 0.5, "mean difference {diff}");

    Ok(())
}

#[test]
fn affine_translation() -> Result<(), RegistrationError> {
    let (master, slave) = shifted_pair(16, 8)?;

    let registration = register_with_config(&master, &slave, &RegistrationConfig::default())?;
    let estimate = &registration.estimate;

    let TransformMatrix::Affine(affine) = estimate.transform else {
        panic!("expected an affine transform");
    };
    let linear = affine.linear();
    assert_relative_eq!(linear[0][0], 1.0, epsilon = 1e-2);
    assert_relative_eq!(linear[0][1], 0.0, epsilon = 1e-2);
    assert_relative_eq!(linear[1][0], 0.0, epsilon = 1e-2);
    assert_relative_eq!(linear[1][1], 1.0, epsilon = 1e-2);
    assert_translation(&estimate.transform, 16.0, 8.0, 0.5);

    assert!(estimate.inliers.len() > 3);
    assert!(estimate.inliers.len() <= estimate.num_correspondences);

    // the warped slave lines up with the master where they overlap
    let diff = mean_abs_diff(&registration.image, &master, 20..CROP_SIZE - 4, 12..CROP_SIZE - 4);
    assert!(diff < 10.0, "mean difference {diff}");

    // pixels with no slave counterpart are background
    assert_eq!(registration.image.as_slice()[0], 0);

    Ok(())
}

#[test]
fn perspective_translation() -> Result<(), RegistrationError> {
    let (master, slave) = shifted_pair(8, 24)?;

    let config = RegistrationConfig::new("warp_perspective".parse()?);
    let estimate = estimate_transform(&master, &slave, &config)?;

    assert!(matches!(estimate.transform, TransformMatrix::Homography(_)));
    assert_translation(&estimate.transform, 8.0, 24.0, 1.0);

    Ok(())
}

#[test]
fn perspective_identity_multichannel() -> Result<(), RegistrationError> {
    let gray = crop_image(64, 0)?;
    let rgb: Vec<f32> = gray
        .as_slice()
        .iter()
        .flat_map(|&v| [v as f32 * 4.0 - 100.0; 3])
        .collect();
    let master = Image::<f32, 3>::new(gray.size(), rgb)?;

    let registered = register(
        &master,
        &master,
        &RegistrationType::WarpPerspective(PerspectiveRegistration::default()),
    )?;

    assert_eq!(registered.size(), master.size());
    assert_eq!(registered.num_channels(), 3);

    let center = (128 * CROP_SIZE + 128) * 3;
    assert_relative_eq!(
        registered.as_slice()[center],
        master.as_slice()[center],
        epsilon = 1e-2
    );

    Ok(())
}

#[test]
fn mixed_sample_types() -> Result<(), RegistrationError> {
    let (master, slave) = shifted_pair(8, 8)?;

    // 12-bit master, 8-bit slave
    let master = Image::<u16, 1>::new(
        master.size(),
        master.as_slice().iter().map(|&v| v as u16 * 16).collect(),
    )?;

    let estimate = estimate_transform(&master, &slave, &RegistrationConfig::default())?;
    assert_translation(&estimate.transform, 8.0, 8.0, 0.5);

    Ok(())
}

#[test]
fn same_seed_same_estimate() -> Result<(), RegistrationError> {
    let (master, slave) = shifted_pair(16, 16)?;

    let config = RegistrationConfig::new("warp_perspective".parse()?).with_random_seed(1234);
    let first = estimate_transform(&master, &slave, &config)?;
    let second = estimate_transform(&master, &slave, &config)?;

    assert_eq!(first, second);

    Ok(())
}

#[test]
fn constant_image_is_degenerate() -> Result<(), RegistrationError> {
    let slave = crop_image(0, 0)?;
    let master = Image::<u16, 1>::from_size_val(slave.size(), 1000)?;

    let result = register(&master, &slave, &RegistrationType::default());
    assert!(matches!(
        result,
        Err(RegistrationError::DegenerateInput {
            image: ImageRole::Master,
            ..
        })
    ));

    let result = register(&slave, &master, &RegistrationType::default());
    assert!(matches!(
        result,
        Err(RegistrationError::DegenerateInput {
            image: ImageRole::Slave,
            ..
        })
    ));

    Ok(())
}

#[test]
fn featureless_image() -> Result<(), RegistrationError> {
    let slave = crop_image(0, 0)?;
    let ramp = Image::<u8, 1>::new(
        slave.size(),
        (0..CROP_SIZE * CROP_SIZE).map(|i| (i % CROP_SIZE) as u8).collect(),
    )?;

    let result = register(&ramp, &slave, &"warp_perspective".parse()?);
    assert_eq!(
        result.err(),
        Some(RegistrationError::NoFeaturesFound {
            image: ImageRole::Master
        })
    );

    Ok(())
}

#[test]
fn no_surviving_matches() -> Result<(), RegistrationError> {
    let (master, slave) = shifted_pair(8, 8)?;

    let mut config = PerspectiveRegistration::default();
    config.cross_check.keep_fraction = 0.0;

    let result = register(&master, &slave, &config.into());
    assert_eq!(
        result.err(),
        Some(RegistrationError::InsufficientMatches {
            required: 4,
            actual: 0
        })
    );

    Ok(())
}

#[test]
fn invalid_configuration() -> Result<(), RegistrationError> {
    let image = crop_image(0, 0)?;

    let mut config = AffineRegistration::default();
    config.ratio_test.ratio = 0.0;

    let result = register(&image, &image, &config.into());
    assert!(matches!(result, Err(RegistrationError::InvalidConfig(_))));

    Ok(())
}

#[test]
fn empty_image() -> Result<(), RegistrationError> {
    let empty = Image::<u8, 1>::new(
        ImageSize {
            width: 0,
            height: 0,
        },
        vec![],
    )?;
    let image = crop_image(0, 0)?;

    assert_eq!(
        register(&empty, &image, &RegistrationType::default()).err(),
        Some(RegistrationError::Image(ImageError::EmptyImage(0, 0)))
    );

    Ok(())
}

#[test]
fn configuration_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let json = r#"{
        "registration_type": {
            "method": "warp_perspective",
            "cross_check": { "keep_fraction": 0.5 },
            "ransac": { "threshold": 2.0 }
        },
        "interpolation": "nearest",
        "random_seed": 7
    }"#;

    let config: RegistrationConfig = serde_json::from_str(json)?;

    let RegistrationType::WarpPerspective(perspective) = config.registration_type else {
        panic!("expected a perspective registration");
    };
    assert_eq!(perspective.cross_check.keep_fraction, 0.5);
    assert_eq!(perspective.ransac.threshold, 2.0);
    assert_eq!(perspective.ransac.max_iterations, 2000);
    assert_eq!(perspective.orb.max_keypoints, 9000);
    assert_eq!(config.random_seed, 7);

    let default: RegistrationConfig = serde_json::from_str("{}")?;
    assert_eq!(default, RegistrationConfig::default());

    let roundtrip: RegistrationConfig = serde_json::from_str(&serde_json::to_string(&config)?)?;
    assert_eq!(roundtrip, config);

    Ok(())
}
