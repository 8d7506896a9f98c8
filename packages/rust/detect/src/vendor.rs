//! Vendor and equipment detection over free-text queries.
//!
//! Detection is table-driven: a fixed alias table per vendor plus
//! fault-code and model-number patterns. Scores are additive and clamped
//! to 1.0; the table order is fixed so ties resolve deterministically.

use regex::Regex;

use rivet_shared::{EquipmentTag, Intent, VendorTag};

/// Score contributed by a vendor-name alias match.
const VENDOR_ALIAS_SCORE: f32 = 0.45;
/// Score contributed by a product-line alias match.
const PRODUCT_ALIAS_SCORE: f32 = 0.2;
/// Score contributed by a model-number pattern match.
const MODEL_SCORE: f32 = 0.2;
/// Score contributed by a fault-code match.
const FAULT_CODE_SCORE: f32 = 0.15;
/// Confidence ceiling when no vendor matched at all.
const NO_VENDOR_CAP: f32 = 0.35;

/// Per-vendor alias tables: (vendor, name aliases, product-line aliases).
const VENDOR_ALIASES: &[(VendorTag, &[&str], &[&str])] = &[
    (
        VendorTag::Siemens,
        &["siemens"],
        &["sinamics", "simatic", "micromaster", "g120", "s7-"],
    ),
    (
        VendorTag::AllenBradley,
        &["allen-bradley", "allen bradley", "rockwell"],
        &["powerflex", "compactlogix", "controllogix", "micrologix"],
    ),
    (
        VendorTag::Abb,
        &["abb"],
        &["acs550", "acs880", "acs355", "ach"],
    ),
    (
        VendorTag::SchneiderElectric,
        &["schneider"],
        &["altivar", "modicon", "atv"],
    ),
    (
        VendorTag::Mitsubishi,
        &["mitsubishi"],
        &["melsec", "fr-a", "fr-d", "fr-e"],
    ),
    (VendorTag::Danfoss, &["danfoss"], &["vlt", "fc302", "fc 302"]),
];

/// Equipment keyword table. First match wins, so order is significant:
/// specific classes come before the generic "drive" keywords.
const EQUIPMENT_KEYWORDS: &[(EquipmentTag, &[&str])] = &[
    (EquipmentTag::ServoDrive, &["servo"]),
    (EquipmentTag::SoftStarter, &["soft starter", "softstarter"]),
    (
        EquipmentTag::VariableFrequencyDrive,
        &["vfd", "variable frequency", "inverter", "drive"],
    ),
    (EquipmentTag::Plc, &["plc", "ladder logic", "controller"]),
    (EquipmentTag::Hmi, &["hmi", "touchscreen", "operator panel"]),
    (EquipmentTag::PowerSupply, &["power supply", "psu"]),
];

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// What the detector concluded about a query.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The extracted intent.
    pub intent: Intent,
    /// A second vendor that matched with exactly the same score as the
    /// best one. The router resolves the tie by historical KB coverage.
    pub runner_up: Option<(VendorTag, f32)>,
}

/// Classifies free-text queries into the vendor/equipment taxonomy.
pub struct VendorDetector {
    fault_code_re: Regex,
    model_re: Regex,
}

impl Default for VendorDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorDetector {
    /// Build a detector. Patterns are static, so compilation cannot fail.
    pub fn new() -> Self {
        Self {
            fault_code_re: Regex::new(r"(?i)\b(?:f|a|e|err)[- ]?\d{2,5}\b")
                .expect("static fault-code regex"),
            model_re: Regex::new(r"(?i)\b[a-z]{1,3}-?\d{2,4}[a-z0-9-]*\b")
                .expect("static model regex"),
        }
    }

    /// Classify a query. Never fails — an unrecognizable query simply
    /// comes back with no vendor and low confidence.
    pub fn detect(&self, query: &str) -> Detection {
        let lower = query.to_lowercase();

        let fault_codes = self.extract_fault_codes(query);
        let models = self.extract_models(query);
        let equipment = detect_equipment(&lower);

        // Score every vendor whose aliases appear in the query.
        let mut scored: Vec<(VendorTag, f32)> = Vec::new();
        for (vendor, names, products) in VENDOR_ALIASES {
            let mut score = 0.0_f32;
            if names.iter().any(|a| lower.contains(a)) {
                score += VENDOR_ALIAS_SCORE;
            }
            if products.iter().any(|a| lower.contains(a)) {
                score += PRODUCT_ALIAS_SCORE;
            }
            if score > 0.0 {
                scored.push((*vendor, score));
            }
        }
        // Stable sort keeps the alias-table order on equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let evidence = {
            let mut e = 0.0_f32;
            if !fault_codes.is_empty() {
                e += FAULT_CODE_SCORE;
            }
            if !models.is_empty() {
                e += MODEL_SCORE;
            }
            e
        };

        let (vendor, confidence, runner_up) = match scored.first() {
            Some((top, top_score)) => {
                let confidence = (top_score + evidence).min(1.0);
                let runner_up = scored
                    .get(1)
                    .filter(|(_, score)| score == top_score)
                    .copied();
                (*top, confidence, runner_up)
            }
            None => {
                // No vendor evidence: confidence comes from fault/model
                // signals alone, capped so routing asks to clarify unless
                // the rest of the query is unambiguous.
                (VendorTag::Generic, evidence.min(NO_VENDOR_CAP), None)
            }
        };

        tracing::debug!(
            vendor = %vendor,
            confidence,
            fault_codes = fault_codes.len(),
            "vendor detection"
        );

        Detection {
            intent: Intent {
                vendor: (vendor != VendorTag::Generic).then_some(vendor),
                equipment,
                fault_codes,
                confidence,
            },
            runner_up,
        }
    }

    /// Fault codes in the query, uppercased and deduplicated.
    pub fn extract_fault_codes(&self, query: &str) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for m in self.fault_code_re.find_iter(query) {
            let code = m.as_str().to_uppercase().replace([' ', '-'], "");
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }

    /// Model-number-shaped tokens in the query, excluding fault codes.
    pub fn extract_models(&self, query: &str) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for m in self.model_re.find_iter(query) {
            if self.fault_code_re.is_match(m.as_str()) {
                continue;
            }
            let model = m.as_str().to_uppercase();
            if !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }
}

/// First equipment class whose keywords appear in the lowercased query.
fn detect_equipment(lower: &str) -> Option<EquipmentTag> {
    EQUIPMENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tag, _)| *tag)
}
