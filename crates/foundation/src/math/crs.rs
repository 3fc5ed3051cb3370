//! ETRS89 / UTM zone 32N (EPSG:25832), the metric CRS of the backing map services.
//!
//! Forward and inverse transverse Mercator use the Krüger series to fourth
//! order in the third flattening. The inverse recovers latitude from the
//! conformal latitude with a Newton iteration, which keeps
//! `geo_to_metric(metric_to_geo(p))` within a micrometer of `p`.

use super::{GRS80_A, GRS80_F, GeoPoint, MetricPoint};

pub const UTM32_EPSG: u32 = 25832;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING: f64 = 0.0;
const CENTRAL_MERIDIAN_DEG: f64 = 9.0;

struct Series {
    e: f64,
    e2: f64,
    /// Rectifying radius scaled by `K0`.
    k0_a: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
}

fn series() -> Series {
    let f = GRS80_F;
    let n = f / (2.0 - f);
    let n2 = n * n;
    let n3 = n2 * n;
    let n4 = n3 * n;
    let a = GRS80_A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

    Series {
        e: 2.0 * n.sqrt() / (1.0 + n),
        e2: f * (2.0 - f),
        k0_a: K0 * a,
        alpha: [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161_280.0,
        ],
        beta: [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161_280.0,
        ],
    }
}

/// Conformal latitude tangent for a geodetic latitude tangent.
fn tau_prime(tau: f64, e: f64) -> f64 {
    let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
    tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt()
}

/// Geographic (ETRS89, degrees) to UTM 32N meters.
pub fn geo_to_metric(p: GeoPoint) -> MetricPoint {
    let s = series();
    let phi = p.lat.to_radians();
    let dlon = (p.lon - CENTRAL_MERIDIAN_DEG).to_radians();

    let t = (phi.sin().atanh() - s.e * (s.e * phi.sin()).atanh()).sinh();
    let xi_p = t.atan2(dlon.cos());
    let eta_p = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in s.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    MetricPoint::new(
        FALSE_EASTING + s.k0_a * eta,
        FALSE_NORTHING + s.k0_a * xi,
    )
}

/// UTM 32N meters to geographic (ETRS89, degrees).
pub fn metric_to_geo(m: MetricPoint) -> GeoPoint {
    let s = series();
    let xi = (m.y - FALSE_NORTHING) / s.k0_a;
    let eta = (m.x - FALSE_EASTING) / s.k0_a;

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in s.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let target = xi_p.sin() / (eta_p.sinh().powi(2) + xi_p.cos().powi(2)).sqrt();
    let mut tau = target;
    for _ in 0..6 {
        let tp = tau_prime(tau, s.e);
        let step = (target - tp) * (1.0 + (1.0 - s.e2) * tau * tau)
            / ((1.0 - s.e2) * (1.0 + tp * tp).sqrt() * (1.0 + tau * tau).sqrt());
        tau += step;
        if step.abs() < 1e-14 {
            break;
        }
    }

    let lat = tau.atan().to_degrees();
    let lon = CENTRAL_MERIDIAN_DEG + eta_p.sinh().atan2(xi_p.cos()).to_degrees();
    GeoPoint::new(lat, lon)
}
