use rand::{rngs::StdRng, SeedableRng};

use imreg_geometry::TransformMatrix;
use imreg_image::{Image, ImageDtype};
use imreg_imgproc::{
    normalize::normalize_to_gray8,
    warp::{warp_affine, warp_perspective},
};

use crate::strategy::{run_strategy, Estimate};
use crate::{ImageRole, RegistrationConfig, RegistrationError, RegistrationType};

/// The slave image resampled in the master frame, with the transform used.
#[derive(Debug, Clone)]
pub struct Registration<T, const C: usize> {
    /// The warped slave image, with the size of the master image.
    pub image: Image<T, C>,
    /// The estimated transform.
    pub estimate: Estimate,
}

fn to_gray8<T: ImageDtype, const C: usize>(
    image: &Image<T, C>,
    role: ImageRole,
) -> Result<Image<u8, 1>, RegistrationError> {
    let mut gray = Image::<u8, 1>::from_size_val(image.size(), 0)?;
    normalize_to_gray8(image, &mut gray).map_err(|e| RegistrationError::from_normalize(e, role))?;
    Ok(gray)
}

/// Estimate the transform mapping `slave` image coordinates to `master` image coordinates.
///
/// Both images are rescaled to 8-bit grayscale, then the pipeline selected by the
/// registration type of `config` runs on them.
///
/// # Errors
///
/// Fails at the first stage that cannot proceed, see [`RegistrationError`].
pub fn estimate_transform<TM, const CM: usize, TS, const CS: usize>(
    master: &Image<TM, CM>,
    slave: &Image<TS, CS>,
    config: &RegistrationConfig,
) -> Result<Estimate, RegistrationError>
where
    TM: ImageDtype,
    TS: ImageDtype,
{
    config.validate()?;

    let master_gray = to_gray8(master, ImageRole::Master)?;
    let slave_gray = to_gray8(slave, ImageRole::Slave)?;

    let mut rng = StdRng::seed_from_u64(config.random_seed);

    log::debug!(
        "registering {} slave onto {} master with {}",
        slave.size(),
        master.size(),
        config.registration_type
    );

    match &config.registration_type {
        RegistrationType::WarpAffine(strategy) => {
            run_strategy(strategy, &master_gray, &slave_gray, &mut rng)
        }
        RegistrationType::WarpPerspective(strategy) => {
            run_strategy(strategy, &master_gray, &slave_gray, &mut rng)
        }
    }
}

/// Register `slave` onto `master` and keep the estimated transform.
///
/// The warped image has the size of the master, its pixels mapping outside the slave
/// are set to zero.
pub fn register_with_config<TM, const CM: usize, TS, const CS: usize>(
    master: &Image<TM, CM>,
    slave: &Image<TS, CS>,
    config: &RegistrationConfig,
) -> Result<Registration<TS, CS>, RegistrationError>
where
    TM: ImageDtype,
    TS: ImageDtype,
{
    let estimate = estimate_transform(master, slave, config)?;

    let mut image = Image::<TS, CS>::from_size_val(master.size(), TS::default())?;
    match &estimate.transform {
        TransformMatrix::Affine(affine) => {
            warp_affine(slave, &mut image, &affine.to_row_major(), config.interpolation)?
        }
        TransformMatrix::Homography(homography) => warp_perspective(
            slave,
            &mut image,
            &homography.to_row_major(),
            config.interpolation,
        )?,
    }

    Ok(Registration { image, estimate })
}

/// Register `slave` onto `master`.
///
/// # Arguments
///
/// * `master` - The reference image, any sample type and channel count.
/// * `slave` - The image to align, any sample type and channel count.
/// * `registration_type` - The transform kind and its pipeline configuration.
///
/// # Returns
///
/// The slave image resampled in the master frame, with the size of the master image.
///
/// # Example
///
/// ```no_run
/// use imreg::{register, RegistrationType};
/// use imreg_image::{Image, ImageSize};
///
/// let size = ImageSize { width: 256, height: 256 };
/// let master = Image::<u16, 1>::new(size, (0..256 * 256).map(|i| (i * 7919 % 4096) as u16).collect()).unwrap();
/// let slave = master.clone();
///
/// let registered = register(&master, &slave, &RegistrationType::default()).unwrap();
/// assert_eq!(registered.size(), master.size());
/// ```
pub fn register<TM, const CM: usize, TS, const CS: usize>(
    master: &Image<TM, CM>,
    slave: &Image<TS, CS>,
    registration_type: &RegistrationType,
) -> Result<Image<TS, CS>, RegistrationError>
where
    TM: ImageDtype,
    TS: ImageDtype,
{
    let config = RegistrationConfig::new(*registration_type);
    Ok(register_with_config(master, slave, &config)?.image)
}
