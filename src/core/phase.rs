use std::f64::consts::{PI, TAU};

#[inline]
pub fn wrap_0_tau(x: f64) -> f64 {
    let r = x.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU.
    if r >= TAU { 0.0 } else { r }
}

/// Phase read-out: wrap into [0, TAU) then shift down by PI, giving [-PI, PI).
#[inline]
pub fn shift_pm_pi(x: f64) -> f64 {
    wrap_0_tau(x) - PI
}

/// Kuramoto order parameter `|mean(exp(i*theta))|`.
pub fn order_parameter(thetas: &[f64]) -> f64 {
    if thetas.is_empty() {
        return 0.0;
    }
    let (mut mean_cos, mut mean_sin) = (0.0f64, 0.0f64);
    for &theta in thetas {
        mean_cos += theta.cos();
        mean_sin += theta.sin();
    }
    let inv_n = 1.0 / thetas.len() as f64;
    mean_cos *= inv_n;
    mean_sin *= inv_n;
    (mean_cos * mean_cos + mean_sin * mean_sin).sqrt()
}
