//! CIGRE TB-601 steady-state thermal balance for a single conductor.
//!
//! The conductor temperature is the root of P_J + P_S - P_c - P_r = 0, found
//! with a bracketing solver over [T_a, T_a + 200]. The model is stateless
//! after construction and safe to call from many threads at once; the Monte
//! Carlo stage holds a shared reference and evaluates it per draw.
use crate::numerics::{find_root_brent, RootFindError};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;

/// Stefan-Boltzmann constant (W/m²K⁴).
const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;

/// Standard gravity (m/s²).
const GRAVITY: f64 = 9.806_65;

/// Width of the bracketing interval above ambient (°C).
const BRACKET_SPAN: f64 = 200.0;

/// Abscissa tolerance of the temperature root (°C).
const TEMPERATURE_TOLERANCE: f64 = 1e-4;

/// Upper bracket for the ampacity inversion (A).
const AMPACITY_MAX_CURRENT: f64 = 10_000.0;

/// Physical parameters of the conductor, immutable after loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConductorParameters {
    /// Outer diameter (m)
    pub diameter: f64,
    /// AC resistance at 25 °C (Ω/m)
    pub resistance_ac_25: f64,
    /// AC resistance at 75 °C (Ω/m)
    pub resistance_ac_75: f64,
    /// Emissivity, in (0, 1]
    pub emissivity: f64,
    /// Solar absorptivity, in (0, 1]
    pub absorptivity: f64,
    /// Maximum design operating temperature (°C)
    pub max_temperature: f64,
}

impl ConductorParameters {
    /// Check the physical plausibility of the parameters.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.diameter > 0.0, "Conductor diameter must be positive");
        ensure!(
            self.resistance_ac_25 > 0.0 && self.resistance_ac_75 > 0.0,
            "AC resistances must be positive"
        );
        ensure!(
            self.resistance_ac_75 >= self.resistance_ac_25,
            "AC resistance at 75 degC cannot be below the 25 degC value"
        );
        ensure!(
            self.emissivity > 0.0 && self.emissivity <= 1.0,
            "Emissivity must be in (0, 1]"
        );
        ensure!(
            self.absorptivity > 0.0 && self.absorptivity <= 1.0,
            "Absorptivity must be in (0, 1]"
        );
        ensure!(
            self.max_temperature.is_finite() && self.max_temperature > 0.0,
            "Maximum operating temperature must be positive"
        );
        Ok(())
    }
}

/// One ambient state at a line point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientConditions {
    /// Air temperature (°C)
    pub air_temperature: f64,
    /// Effective global solar irradiance (W/m²)
    pub solar_radiation: f64,
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Angle between wind and conductor axis, degrees in [0, 90]
    pub attack_angle: f64,
}

/// Thermal conductivity of air at the film temperature (W/mK).
fn air_conductivity(film_temperature: f64) -> f64 {
    2.368e-2 + 7.23e-5 * film_temperature - 2.763e-8 * film_temperature.powi(2)
}

/// Kinematic viscosity of air at the film temperature (m²/s).
fn air_kinematic_viscosity(film_temperature: f64) -> f64 {
    1.32e-5 + 9.5e-8 * film_temperature
}

/// Prandtl number of air at the film temperature.
fn air_prandtl(film_temperature: f64) -> f64 {
    0.715 - 2.5e-4 * film_temperature
}

/// CIGRE TB-601 steady-state thermal model for one conductor.
#[derive(Debug, Clone)]
pub struct CigreThermalModel {
    conductor: ConductorParameters,
    /// sin of the solar incidence angle applied to the irradiance
    solar_incidence_sin: f64,
}

impl CigreThermalModel {
    /// Build a model for a conductor, with the solar incidence angle in
    /// degrees (90° means the irradiance acts fully on the conductor).
    pub fn new(conductor: ConductorParameters, solar_incidence: f64) -> Result<Self> {
        conductor
            .validate()
            .context("Invalid conductor parameters")?;
        ensure!(
            (0.0..=90.0).contains(&solar_incidence),
            "Solar incidence angle must be in [0, 90] degrees"
        );
        Ok(Self {
            conductor,
            solar_incidence_sin: solar_incidence.to_radians().sin(),
        })
    }

    /// The conductor parameters the model was built from.
    pub fn conductor(&self) -> &ConductorParameters {
        &self.conductor
    }

    /// AC resistance at a conductor temperature (Ω/m).
    ///
    /// Linear between the 25 °C and 75 °C values; the same slope is used for
    /// extrapolation outside that interval.
    pub fn resistance(&self, conductor_temperature: f64) -> f64 {
        let c = &self.conductor;
        c.resistance_ac_25
            + (conductor_temperature - 25.0) * (c.resistance_ac_75 - c.resistance_ac_25) / 50.0
    }

    /// Joule heating per unit length (W/m).
    fn joule_heating(&self, current: f64, conductor_temperature: f64) -> f64 {
        current.powi(2) * self.resistance(conductor_temperature)
    }

    /// Solar heat gain per unit length (W/m).
    fn solar_heating(&self, solar_radiation: f64) -> f64 {
        self.conductor.absorptivity
            * self.conductor.diameter
            * solar_radiation
            * self.solar_incidence_sin
    }

    /// Convective cooling per unit length (W/m), TB-601 forced/natural mix.
    fn convective_cooling(&self, conductor_temperature: f64, ambient: &AmbientConditions) -> f64 {
        let delta_t = conductor_temperature - ambient.air_temperature;
        let film = (conductor_temperature + ambient.air_temperature) / 2.0;
        let conductivity = air_conductivity(film);
        let viscosity = air_kinematic_viscosity(film);
        let diameter = self.conductor.diameter;

        // Forced convection: Nu for perpendicular flow, then the
        // wind-attack-angle correction
        let reynolds = ambient.wind_speed * diameter / viscosity;
        let nusselt_forced = forced_nusselt(reynolds) * attack_angle_factor(ambient.attack_angle);

        // Natural convection as the low-wind floor
        let prandtl = air_prandtl(film);
        let grashof =
            diameter.powi(3) * delta_t * GRAVITY / ((film + 273.15) * viscosity.powi(2));
        let nusselt_natural = natural_nusselt(grashof * prandtl);

        let nusselt = nusselt_forced.max(nusselt_natural);
        std::f64::consts::PI * conductivity * nusselt * delta_t
    }

    /// Radiative cooling per unit length (W/m).
    fn radiative_cooling(&self, conductor_temperature: f64, air_temperature: f64) -> f64 {
        std::f64::consts::PI
            * self.conductor.diameter
            * self.conductor.emissivity
            * STEFAN_BOLTZMANN
            * ((conductor_temperature + 273.15).powi(4) - (air_temperature + 273.15).powi(4))
    }

    /// Net heat input at a candidate conductor temperature (W/m).
    ///
    /// Zero at the steady-state temperature.
    pub fn heat_balance(
        &self,
        conductor_temperature: f64,
        current: f64,
        ambient: &AmbientConditions,
    ) -> f64 {
        self.joule_heating(current, conductor_temperature) + self.solar_heating(ambient.solar_radiation)
            - self.convective_cooling(conductor_temperature, ambient)
            - self.radiative_cooling(conductor_temperature, ambient.air_temperature)
    }

    /// Steady-state conductor temperature for a current and ambient state.
    ///
    /// # Errors
    ///
    /// Returns the root-finder error when the balance cannot be bracketed in
    /// [T_a, T_a + 200]; the caller discards the draw.
    pub fn conductor_temperature(
        &self,
        current: f64,
        ambient: &AmbientConditions,
    ) -> Result<f64, RootFindError> {
        let lower = ambient.air_temperature;
        find_root_brent(
            |t| self.heat_balance(t, current, ambient),
            lower,
            lower + BRACKET_SPAN,
            TEMPERATURE_TOLERANCE,
        )
    }

    /// The current that holds the conductor exactly at `max_temperature`
    /// under a fixed ambient state.
    ///
    /// The steady-state temperature is strictly increasing in current, so a
    /// bracketing search over [0, 10 kA] suffices.
    pub fn ampacity(
        &self,
        max_temperature: f64,
        ambient: &AmbientConditions,
    ) -> Result<f64, RootFindError> {
        find_root_brent(
            |current| match self.conductor_temperature(current, ambient) {
                Ok(t) => t - max_temperature,
                // Balance no longer brackets: the conductor is past the top
                // of the temperature interval, hotter than any design limit
                Err(_) => ambient.air_temperature + BRACKET_SPAN - max_temperature,
            },
            0.0,
            AMPACITY_MAX_CURRENT,
            1e-3,
        )
    }
}

/// Perpendicular-flow Nusselt number, TB-601 stranded-conductor bands.
fn forced_nusselt(reynolds: f64) -> f64 {
    if reynolds <= 0.0 {
        return 0.0;
    }
    if reynolds < 2.65e3 {
        0.641 * reynolds.powf(0.471)
    } else {
        0.178 * reynolds.powf(0.633)
    }
}

/// Wind-attack-angle correction K(δ), δ in degrees from the conductor axis.
fn attack_angle_factor(attack_angle: f64) -> f64 {
    let sin_delta = attack_angle.to_radians().sin();
    if attack_angle < 24.0 {
        0.42 + 0.68 * sin_delta.powf(1.08)
    } else {
        0.42 + 0.58 * sin_delta.powf(0.90)
    }
}

/// Natural-convection Nusselt number from the Grashof-Prandtl product.
fn natural_nusselt(grashof_prandtl: f64) -> f64 {
    if grashof_prandtl <= 0.0 {
        return 0.0;
    }
    if grashof_prandtl < 1e4 {
        0.850 * grashof_prandtl.powf(0.188)
    } else {
        0.480 * grashof_prandtl.powf(0.250)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::drake_conductor;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn model() -> CigreThermalModel {
        CigreThermalModel::new(drake_conductor(), 90.0).unwrap()
    }

    fn baseline_ambient() -> AmbientConditions {
        AmbientConditions {
            air_temperature: 25.0,
            solar_radiation: 0.0,
            wind_speed: 0.5,
            attack_angle: 90.0,
        }
    }

    #[test]
    fn test_resistance_interpolation() {
        let model = model();
        assert_approx_eq!(f64, model.resistance(25.0), 7.28e-5, epsilon = 1e-12);
        assert_approx_eq!(f64, model.resistance(75.0), 9.09e-5, epsilon = 1e-12);
        assert_approx_eq!(f64, model.resistance(50.0), 8.185e-5, epsilon = 1e-12);
        // Extrapolation keeps the same slope
        assert_approx_eq!(f64, model.resistance(100.0), 9.995e-5, epsilon = 1e-12);
        assert!(model.resistance(0.0) < 7.28e-5);
    }

    #[test]
    fn test_no_sun_baseline() {
        let model = model();
        let ambient = baseline_ambient();
        let temperature = model.conductor_temperature(500.0, &ambient).unwrap();

        assert!(
            temperature > 35.0 && temperature < 70.0,
            "temperature {temperature}"
        );
        // Energy balance closes at the root
        let residual = model.heat_balance(temperature, 500.0, &ambient);
        assert!(residual.abs() < 1e-2, "residual {residual}");
    }

    #[test]
    fn test_high_sun_runs_hotter() {
        let model = model();
        let baseline = model
            .conductor_temperature(500.0, &baseline_ambient())
            .unwrap();
        let sunny = AmbientConditions {
            air_temperature: 30.0,
            solar_radiation: 1000.0,
            wind_speed: 1.0,
            attack_angle: 90.0,
        };
        let temperature = model.conductor_temperature(500.0, &sunny).unwrap();
        assert!(temperature > baseline);

        let residual = model.heat_balance(temperature, 500.0, &sunny);
        assert!(residual.abs() < 1e-2, "residual {residual}");
    }

    #[test]
    fn test_monotonic_in_current() {
        let model = model();
        let ambient = baseline_ambient();
        let mut previous = ambient.air_temperature;
        for current in [100.0, 300.0, 500.0, 700.0, 900.0] {
            let temperature = model.conductor_temperature(current, &ambient).unwrap();
            assert!(
                temperature > previous,
                "{current} A gave {temperature}, previous {previous}"
            );
            previous = temperature;
        }
    }

    #[rstest]
    #[case::air_temperature(
        AmbientConditions { air_temperature: 35.0, ..baseline_ambient() },
        true
    )]
    #[case::solar_radiation(
        AmbientConditions { solar_radiation: 800.0, ..baseline_ambient() },
        true
    )]
    #[case::wind_speed(
        AmbientConditions { wind_speed: 3.0, ..baseline_ambient() },
        false
    )]
    fn test_monotonic_in_ambient(#[case] perturbed: AmbientConditions, #[case] hotter: bool) {
        let model = model();
        let baseline = model
            .conductor_temperature(500.0, &baseline_ambient())
            .unwrap();
        let temperature = model.conductor_temperature(500.0, &perturbed).unwrap();
        if hotter {
            assert!(temperature > baseline);
        } else {
            assert!(temperature < baseline);
        }
    }

    #[test]
    fn test_natural_convection_floor_near_calm() {
        let model = model();
        // Near-zero wind must still converge, held up by natural convection
        let calm = AmbientConditions {
            wind_speed: 0.01,
            ..baseline_ambient()
        };
        let temperature = model.conductor_temperature(500.0, &calm).unwrap();
        assert!(temperature > baseline_ambient().air_temperature);
        assert!(temperature < 120.0);

        // And calm air runs hotter than a 2 m/s crosswind
        let breezy = AmbientConditions {
            wind_speed: 2.0,
            ..baseline_ambient()
        };
        let breezy_temperature = model.conductor_temperature(500.0, &breezy).unwrap();
        assert!(temperature > breezy_temperature);
    }

    #[test]
    fn test_parallel_wind_cools_less() {
        let model = model();
        let perpendicular = model
            .conductor_temperature(500.0, &baseline_ambient())
            .unwrap();
        let parallel = AmbientConditions {
            attack_angle: 0.0,
            ..baseline_ambient()
        };
        let parallel_temperature = model.conductor_temperature(500.0, &parallel).unwrap();
        assert!(parallel_temperature > perpendicular);
    }

    #[test]
    fn test_zero_current_no_sun_stays_at_ambient() {
        let model = model();
        let ambient = baseline_ambient();
        let temperature = model.conductor_temperature(0.0, &ambient).unwrap();
        assert_approx_eq!(f64, temperature, ambient.air_temperature, epsilon = 1e-3);
    }

    #[test]
    fn test_ampacity_inverts_temperature() {
        let model = model();
        let ambient = baseline_ambient();
        let ampacity = model.ampacity(75.0, &ambient).unwrap();
        assert!(ampacity > 500.0, "ampacity {ampacity}");

        let temperature = model.conductor_temperature(ampacity, &ambient).unwrap();
        assert_approx_eq!(f64, temperature, 75.0, epsilon = 0.1);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    fn test_invalid_diameter_rejected(#[case] diameter: f64) {
        let conductor = ConductorParameters {
            diameter,
            ..drake_conductor()
        };
        assert!(CigreThermalModel::new(conductor, 90.0).is_err());
    }

    #[test]
    fn test_inverted_resistances_rejected() {
        let conductor = ConductorParameters {
            resistance_ac_25: 9.09e-5,
            resistance_ac_75: 7.28e-5,
            ..drake_conductor()
        };
        assert!(CigreThermalModel::new(conductor, 90.0).is_err());
    }

    #[test]
    fn test_emissivity_bounds() {
        let conductor = ConductorParameters {
            emissivity: 1.2,
            ..drake_conductor()
        };
        assert!(CigreThermalModel::new(conductor, 90.0).is_err());

        let conductor = ConductorParameters {
            emissivity: 0.0,
            ..drake_conductor()
        };
        assert!(CigreThermalModel::new(conductor, 90.0).is_err());
    }
}
