/// Physical constants used in ballistics calculations
///
/// Everything in this crate works in imperial internal units: feet,
/// feet per second, radians, grains, degrees Fahrenheit, and inches of
/// mercury. The constants below are the reference values those units
/// hang off.

/// Gravitational acceleration in ft/s², signed for the shooter frame
/// (y is height above the muzzle, gravity pulls it negative)
pub const GRAVITY_FPS2: f64 = -32.17405;

/// ICAO standard sea-level temperature (°F)
pub const STANDARD_TEMPERATURE_F: f64 = 59.0;

/// ICAO standard sea-level pressure (inHg)
pub const STANDARD_PRESSURE_INHG: f64 = 29.92;

/// ICAO standard sea-level air density (kg/m³)
///
/// Denominator of every density ratio this crate reports. Local air
/// density from the CIPM-2007 formula is divided by this value.
pub const STANDARD_DENSITY_KG_M3: f64 = 1.2250;

/// Offset from degrees Fahrenheit to degrees Rankine
pub const FAHRENHEIT_TO_RANKINE: f64 = 459.67;

/// Speed of sound coefficient for imperial units
///
/// Speed of sound in air is `49.0223 * sqrt(T_rankine)` fps. The
/// coefficient is sqrt(gamma * R_specific) expressed in ft/s per √°R.
/// At the ICAO standard 59°F this gives 1116.45 fps.
///
/// Source: International Standard Atmosphere (ISO 2533)
pub const SPEED_OF_SOUND_COEFF_FPS: f64 = 49.0223;

/// ICAO troposphere temperature lapse rate (°F per foot of altitude)
pub const TEMPERATURE_LAPSE_F_PER_FT: f64 = -3.56616e-3;

/// ISA troposphere density exponent
///
/// Along the standard lapse, density scales as `(T/T0)^4.2559`.
/// Value is g/(L·R) − 1 for the standard lapse rate L.
pub const DENSITY_EXPONENT: f64 = 4.2559;

/// Altitude of the ICAO tropopause (ft)
///
/// Queries above this are outside the single-lapse model and get
/// clamped with a warning.
pub const TROPOPAUSE_ALTITUDE_FT: f64 = 36089.0;

/// Critical drag coefficient to retardation conversion constant
///
/// Converts a drag coefficient into a per-foot retardation factor for a
/// ballistic coefficient expressed in lb/in².
///
/// Value: pi * 0.076474 / (8 * 144) = 2.08551e-4
///
/// Derivation:
/// - 0.076474: standard sea-level air density in lb/ft³
/// - pi/8: circular cross-section folded into the sectional density
/// - 144: in² to ft² for the BC denominator
///
/// Physical meaning: multiplying by `cd / bc` and the local density
/// ratio yields k such that drag deceleration = k * v².
///
/// Source: Classical ballistics theory (McCoy), standard-projectile
/// method used by all G-table trajectory programs.
pub const DRAG_CONVERSION_FACTOR: f64 = 2.08551e-4;

/// Denominator of the kinetic energy formula `weight_gr * v² / 450400`
/// in ft·lb. Traditional rounded form of 2 * g * 7000 gr/lb.
pub const ENERGY_DENOMINATOR: f64 = 450400.0;

/// Coefficient of the optimal game weight estimate
/// `weight_gr² * v³ * 1.5e-12` in lb
pub const OGW_COEFFICIENT: f64 = 1.5e-12;

/// Earth's sidereal angular velocity (rad/s), for Coriolis acceleration
pub const EARTH_ANGULAR_VELOCITY_RAD_S: f64 = 7.292115e-5;

/// Conversion factor: inches per foot
pub const INCHES_PER_FOOT: f64 = 12.0;

/// Conversion factor: hectopascals (millibars) per inch of mercury
///
/// The CIPM-2007 air density formula works in metric pressure.
pub const HPA_PER_INHG: f64 = 33.8639;

// Integration step constants

/// Nominal spatial step for the fixed-step Euler engine (ft), before the
/// configured step multiplier is applied
pub const EULER_BASE_STEP_FT: f64 = 0.5;

/// Scale applied to the Euler step by the velocity-Verlet engine, which
/// trades step size for long-run energy behavior
pub const VERLET_STEP_SCALE: f64 = 0.2;

/// Ceiling on any derived spatial step (ft)
pub const MAX_CALC_STEP_FT: f64 = 1.0;

// Numerical stability constants

/// Minimum threshold for preventing division by zero in general calculations
pub const MIN_DIVISION_THRESHOLD: f64 = 1e-12;

/// Look angles within this many radians of vertical make the apex the
/// maximum-range point, short-circuiting the elevation search
pub const APEX_IS_MAX_RANGE_RAD: f64 = 3e-4;

/// Bracket width (rad) at which the golden-section elevation search stops
pub const GOLDEN_SECTION_TOLERANCE_RAD: f64 = 1e-5;

/// Hard cap on integration steps per trajectory
///
/// Normal shots stay far below this. Hitting the cap truncates the
/// trajectory instead of looping forever.
pub const MAX_INTEGRATION_STEPS: usize = 3_000_000;
