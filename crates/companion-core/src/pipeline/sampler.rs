//! Sampler name canonicalization.

use crate::config::AppConfig;
use tracing::warn;

/// Sampler names the batch tool accepts.
pub const CANONICAL_SAMPLERS: &[&str] = &[
    "DDIM",
    "DPM adaptive",
    "DPM fast",
    "DPM++ 2M",
    "DPM++ 2M SDE",
    "DPM++ 2M SDE Heun",
    "DPM++ 2S a",
    "DPM++ 3M SDE",
    "DPM++ SDE",
    "DPM2",
    "DPM2 a",
    "Euler",
    "Euler a",
    "Heun",
    "LCM",
    "LMS",
    "PLMS",
    "Restart",
    "UniPC",
];

/// Known spellings from other tools (lowercased) and their canonical names.
const SAMPLER_ALIASES: &[(&str, &str)] = &[
    ("dpmpp_2m_sde_gpu", "DPM++ 2M SDE"),
    ("dpmpp_2m_karras", "DPM++ 2M"),
    ("dpmpp_3m_sde", "DPM++ 3M SDE"),
    ("ddim_ddim_uniform", "DDIM"),
    ("dpm++ 2m sde sgmuniform", "DPM++ 2M SDE"),
    ("dpmpp_sde_karras", "DPM++ SDE"),
    ("dpmpp_2s_ancestral_karras", "DPM++ 2S a"),
    ("dpm++ 2m sde gpu", "DPM++ 2M SDE"),
    ("dpmpp_3m_sde_gpu_karras", "DPM++ 3M SDE"),
    ("dpmpp_2m_alt_karras", "DPM++ 2M"),
    ("dpmpp_3m_sde_gpu", "DPM++ 3M SDE"),
    ("euler_max", "Euler"),
    ("dpmpp_2m_turbo", "DPM++ 2M"),
    ("dpm++ 2m sde ays", "DPM++ 2M SDE"),
    ("euler a turbo", "Euler a"),
    ("dpmpp_sde_sgm_uniform", "DPM++ SDE"),
    ("dpm++ 2m sgmuniform", "DPM++ 2M"),
    ("dpmpp_3m_sde_karras", "DPM++ 3M SDE"),
    ("dpmpp_2m_sde_karras", "DPM++ 2M SDE"),
    ("ddim_sgm_uniform", "DDIM"),
    ("dpm++ 2m turbo", "DPM++ 2M"),
    ("dpmpp_sde", "DPM++ SDE"),
    ("dpmpp_sde_gpu_karras", "DPM++ SDE"),
    ("dpm_2_turbo", "DPM2"),
    ("ddpm", "DPM2"),
    ("euler_ancestral", "Euler a"),
    ("dpmpp_3m_sde_gpu_sgm_uniform", "DPM++ 3M SDE"),
];

/// Map any sampler spelling to a canonical sampler name.
///
/// Exact case-insensitive matches win, then the alias table. Anything else
/// becomes [`AppConfig::DEFAULT_SAMPLER`]; a non-empty unknown name is
/// logged.
pub fn canonical_sampler(sampler: &str) -> &'static str {
    let key = sampler.trim().to_lowercase();

    if let Some(name) = CANONICAL_SAMPLERS
        .iter()
        .copied()
        .find(|s| s.to_lowercase() == key)
    {
        return name;
    }
    if let Some((_, name)) = SAMPLER_ALIASES
        .iter()
        .copied()
        .find(|(alias, _)| *alias == key)
    {
        return name;
    }
    if !key.is_empty() {
        warn!(
            "Couldn't find suitable sampler translation for {}; using default ({})",
            key,
            AppConfig::DEFAULT_SAMPLER
        );
    }
    AppConfig::DEFAULT_SAMPLER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_case_insensitive() {
        assert_eq!(canonical_sampler("euler a"), "Euler a");
        assert_eq!(canonical_sampler(" DPM++ 2M SDE "), "DPM++ 2M SDE");
    }

    #[test]
    fn test_aliases() {
        assert_eq!(canonical_sampler("dpmpp_2m_karras"), "DPM++ 2M");
        assert_eq!(canonical_sampler("euler_ancestral"), "Euler a");
        assert_eq!(canonical_sampler("DPMPP_3M_SDE_GPU"), "DPM++ 3M SDE");
    }

    #[test]
    fn test_unknown_and_empty_fall_back() {
        assert_eq!(canonical_sampler("xyz"), "DPM++ 2M");
        assert_eq!(canonical_sampler(""), "DPM++ 2M");
    }

    #[test]
    fn test_aliases_resolve_to_canonical_names() {
        for (_, name) in SAMPLER_ALIASES {
            assert!(CANONICAL_SAMPLERS.contains(name));
        }
    }
}
