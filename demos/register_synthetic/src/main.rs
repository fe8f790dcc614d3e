use argh::FromArgs;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use imreg::{
    geometry::TransformMatrix,
    image::{Image, ImageSize},
    imgproc::{filter::gaussian_blur, interpolation::InterpolationMode, warp},
    register_with_config, RegistrationConfig, RegistrationType,
};

#[derive(FromArgs)]
/// Register a synthetic slave image, obtained by warping a random scene with a known
/// transform, back onto the scene.
struct Args {
    /// registration type, warp_affine or warp_perspective
    #[argh(option, short = 'm', default = "\"warp_affine\".to_string()")]
    method: String,

    /// path to a JSON registration configuration, overrides the method
    #[argh(option)]
    config: Option<PathBuf>,

    /// width and height of the scene in pixels
    #[argh(option, default = "512")]
    size: usize,

    /// seed of the scene generator
    #[argh(option, default = "0")]
    scene_seed: u64,
}

/// A 12-bit scene made of blurred random blocks.
fn synthetic_scene(size: usize, seed: u64) -> Result<Image<u16, 1>, Box<dyn std::error::Error>> {
    const BLOCK: usize = 12;

    let mut rng = StdRng::seed_from_u64(seed);
    let blocks_per_row = size / BLOCK + 1;
    let blocks: Vec<f32> = (0..blocks_per_row * blocks_per_row)
        .map(|_| rng.random_range(0.0..4095.0))
        .collect();

    let image_size = ImageSize {
        width: size,
        height: size,
    };
    let blocky = Image::<f32, 1>::new(
        image_size,
        (0..size * size)
            .map(|i| blocks[(i / size / BLOCK) * blocks_per_row + (i % size) / BLOCK])
            .collect(),
    )?;

    let mut scene = Image::<u16, 1>::from_size_val(image_size, 0)?;
    gaussian_blur(&blocky, &mut scene, 1.0)?;

    Ok(scene)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => RegistrationConfig::new(args.method.parse()?),
    };

    let master = synthetic_scene(args.size, args.scene_seed)?;
    let center = (args.size as f64 / 2.0, args.size as f64 / 2.0);

    // the slave is the master seen through `master_to_slave`
    let mut slave = Image::<u16, 1>::from_size_val(master.size(), 0)?;
    let expected = match config.registration_type {
        RegistrationType::WarpAffine(_) => {
            let mut master_to_slave = warp::get_rotation_matrix2d(center, 5.0, 1.05);
            master_to_slave[2] += 7.0;
            master_to_slave[5] -= 4.0;
            warp::warp_affine(&master, &mut slave, &master_to_slave, InterpolationMode::Bilinear)?;
            warp::invert_affine_transform(&master_to_slave)?.to_vec()
        }
        RegistrationType::WarpPerspective(_) => {
            let master_to_slave = [1.0, 0.03, 6.0, -0.02, 0.98, 3.0, 4e-5, -2e-5, 1.0];
            warp::warp_perspective(
                &master,
                &mut slave,
                &master_to_slave,
                InterpolationMode::Bilinear,
            )?;
            warp::inverse_perspective_matrix(&master_to_slave)?.to_vec()
        }
    };

    log::info!(
        "registering a {}x{} scene with {}",
        args.size,
        args.size,
        config.registration_type
    );

    let now = std::time::Instant::now();
    let registration = register_with_config(&master, &slave, &config)?;
    log::info!("registration took {:?}", now.elapsed());

    let estimated = match &registration.estimate.transform {
        TransformMatrix::Affine(affine) => affine.to_row_major().to_vec(),
        TransformMatrix::Homography(homography) => homography.to_row_major().to_vec(),
    };

    println!("expected slave -> master: {:.4?}", expected);
    println!("estimated slave -> master: {:.4?}", estimated);
    println!(
        "{}",
        serde_json::to_string_pretty(&registration.estimate.transform)?
    );
    println!(
        "keypoints: {} master, {} slave; correspondences: {}; inliers: {}",
        registration.estimate.master_keypoints,
        registration.estimate.slave_keypoints,
        registration.estimate.num_correspondences,
        registration.estimate.inliers.len()
    );

    // mean absolute difference where the registered slave is defined
    let (sum, count) = registration
        .image
        .as_slice()
        .iter()
        .zip(master.as_slice())
        .filter(|(r, _)| **r > 0)
        .fold((0.0, 0usize), |(sum, count), (&r, &m)| {
            (sum + (r as f64 - m as f64).abs(), count + 1)
        });
    println!(
        "mean absolute difference over {} pixels: {:.2}",
        count,
        sum / count.max(1) as f64
    );

    Ok(())
}
