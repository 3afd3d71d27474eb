// src/analyze/fallback.rs
//! Deterministic rule-based analysis — the terminal step of the cascade.
//!
//! Keyword tables over the source document, no network, no failure path.
//! Confidence is pinned at the reduced 0.5 and `provider_used` is `"basico"`
//! so downstream consumers can tell degraded output apart.

use crate::analyze::schema::AnalysisReport;

pub const FALLBACK_PROVIDER: &str = "basico";

/// Component keyword table: (component label, trigger words, pain descriptor).
/// Triggers are matched as lowercase substrings; accent-stripped variants are
/// listed explicitly because feed text arrives both ways.
const COMPONENTS: &[(&str, &[&str], &str)] = &[
    (
        "topografia",
        &["topograf", "levantamiento", "taquim"],
        "Necesita levantamientos de campo con plazos ajustados",
    ),
    (
        "cartografia",
        &["cartograf", "ortofoto", "mapa"],
        "Requiere produccion o actualizacion cartografica",
    ),
    (
        "fotogrametria",
        &["fotogrametr", "dron", "drone", "uav", "vuelo"],
        "Captura aerea: vuelos fotogrametricos o con dron",
    ),
    (
        "lidar",
        &["lidar", "nube de puntos", "laser escaner", "escaner laser"],
        "Captura masiva 3D y procesado de nubes de puntos",
    ),
    (
        "gis",
        &["gis", "sig ", "geoportal", "geografica"],
        "Implantacion o mantenimiento de sistemas de informacion geografica",
    ),
    (
        "bim",
        &["bim", "modelado 3d", "revit", "ifc"],
        "Modelado BIM de infraestructura o edificacion",
    ),
    (
        "batimetria",
        &["batimetr", "hidrograf"],
        "Trabajos batimetricos o hidrograficos",
    ),
    (
        "deslinde",
        &["deslinde", "catastr", "parcelari"],
        "Trabajos catastrales, deslindes o parcelarios",
    ),
];

/// Analyze a source document with keyword heuristics. Total function: always
/// returns a report, even for empty input.
pub fn analyze(text: &str) -> AnalysisReport {
    let haystack = text.to_lowercase();

    let mut detected = Vec::new();
    let mut pains = Vec::new();
    for (label, triggers, pain) in COMPONENTS {
        if triggers.iter().any(|t| haystack.contains(t)) {
            detected.push((*label).to_string());
            pains.push((*pain).to_string());
        }
    }

    let score = ((25 + 15 * detected.len()) as f32).min(100.0);
    let tier = if detected.is_empty() {
        "desconocido".to_string()
    } else {
        tier_label(score)
    };

    let outreach_text = if detected.is_empty() {
        "Hemos visto su licitacion publicada y nos gustaria conocer mejor el alcance tecnico \
         del proyecto para valorar como podemos apoyarles."
            .to_string()
    } else {
        format!(
            "Hemos visto su licitacion y encaja con nuestra experiencia en {}. \
             Nos gustaria presentarles referencias de proyectos similares.",
            detected.join(", ")
        )
    };

    AnalysisReport {
        score,
        tier,
        detected_components: detected,
        pain_points: pains,
        contact_leads: Vec::new(),
        outreach_text,
        confidence: 0.5,
        provider_used: FALLBACK_PROVIDER.to_string(),
    }
}

fn tier_label(score: f32) -> String {
    if score >= 85.0 {
        "top"
    } else if score >= 70.0 {
        "mid"
    } else if score >= 50.0 {
        "low"
    } else {
        "reject"
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_returns_a_report() {
        let r = analyze("");
        assert_eq!(r.provider_used, "basico");
        assert!((r.confidence - 0.5).abs() < f32::EPSILON);
        assert_eq!(r.tier, "desconocido");
        assert!(!r.outreach_text.is_empty());
    }

    #[test]
    fn detects_components_and_derives_pains() {
        let r = analyze(
            "Levantamiento topografico con dron y entrega de nube de puntos LiDAR \
             para actualizacion cartografica.",
        );
        assert!(r.detected_components.contains(&"topografia".to_string()));
        assert!(r.detected_components.contains(&"fotogrametria".to_string()));
        assert!(r.detected_components.contains(&"lidar".to_string()));
        assert!(r.detected_components.contains(&"cartografia".to_string()));
        assert_eq!(r.pain_points.len(), r.detected_components.len());
        assert!(r.score > 25.0);
        assert!(r.outreach_text.contains("topografia"));
    }

    #[test]
    fn score_is_capped() {
        let text = "topografia cartografia fotogrametria lidar gis bim batimetria deslinde \
                    dron ortofoto revit catastro";
        let r = analyze(text);
        assert!(r.score <= 100.0);
    }
}
