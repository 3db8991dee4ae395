use super::BiasDetector;
use crate::domain::{
    BiasDimension, BiasKind, BiasReport, BiasSeverity, DemographicRecord, Language,
    MitigationResult, MitigationStatus,
};
use rand::Rng;
use std::collections::BTreeMap;

impl BiasDetector {
    /// Rebalances a population according to a report from [`BiasDetector::detect`].
    ///
    /// Representation indicators oversample smaller groups (with replacement)
    /// up to the size of the largest group along that dimension. Linguistic
    /// findings then truncate Arabic and English to the smaller of the two;
    /// bilingual records are kept as they are.
    pub fn apply_mitigation<R: Rng + ?Sized>(
        &self,
        records: &[DemographicRecord],
        report: &BiasReport,
        rng: &mut R,
    ) -> MitigationResult {
        if !report.detected {
            return MitigationResult {
                status: MitigationStatus::NotRequired,
                records: records.to_vec(),
                applied: Vec::new(),
            };
        }
        if report.severity == BiasSeverity::Low {
            log::info!(
                "Bias severity {:.2} is low, data left unchanged",
                report.severity_score
            );
            return MitigationResult {
                status: MitigationStatus::Checked,
                records: records.to_vec(),
                applied: Vec::new(),
            };
        }

        let threshold = self.config.detection_threshold;
        let mut balanced = records.to_vec();
        let mut applied = Vec::new();

        for indicator in report.indicators.iter().filter(|i| i.severity > threshold) {
            let key: fn(&DemographicRecord) -> Option<String> = match indicator.dimension {
                BiasDimension::Language => |r| Some(r.language.to_string()),
                BiasDimension::AgeBracket => |r| Some(r.age_bracket.to_string()),
                BiasDimension::CulturalBackground => |r| Some(r.cultural_background.clone()),
                BiasDimension::Socioeconomic => |r| r.socioeconomic.map(|s| s.to_string()),
                BiasDimension::Outcome | BiasDimension::Prediction => continue,
            };
            let added = oversample(&mut balanced, key, rng);
            if added > 0 {
                applied.push(format!(
                    "Oversampled {:?} groups with {added} additional record(s)",
                    indicator.dimension
                ));
            }
        }

        let linguistic = report
            .indicators
            .iter()
            .any(|i| i.kind == BiasKind::Linguistic && i.severity > threshold);
        if linguistic {
            match equalize_languages(&mut balanced) {
                Some(0) => {}
                Some(removed) => applied.push(format!(
                    "Truncated Arabic and English groups to equal size ({removed} record(s) removed)"
                )),
                None => log::debug!("Language truncation skipped: one language group is empty"),
            }
        }

        log::info!(
            "Bias mitigation applied {} step(s): {} -> {} records",
            applied.len(),
            records.len(),
            balanced.len()
        );
        MitigationResult {
            status: MitigationStatus::Mitigated,
            records: balanced,
            applied,
        }
    }
}

fn oversample<R: Rng + ?Sized>(
    records: &mut Vec<DemographicRecord>,
    key: fn(&DemographicRecord) -> Option<String>,
    rng: &mut R,
) -> usize {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        if let Some(k) = key(record) {
            groups.entry(k).or_default().push(idx);
        }
    }
    let Some(largest) = groups.values().map(Vec::len).max() else {
        return 0;
    };

    let mut extra = Vec::new();
    for members in groups.values() {
        for _ in members.len()..largest {
            let pick = members[rng.gen_range(0..members.len())];
            extra.push(records[pick].clone());
        }
    }
    let added = extra.len();
    records.extend(extra);
    added
}

/// Returns `None` when either language group is empty.
fn equalize_languages(records: &mut Vec<DemographicRecord>) -> Option<usize> {
    let arabic = records
        .iter()
        .filter(|r| r.language == Language::Arabic)
        .count();
    let english = records
        .iter()
        .filter(|r| r.language == Language::English)
        .count();
    let target = arabic.min(english);
    if target == 0 {
        return None;
    }

    let before = records.len();
    let (mut kept_ar, mut kept_en) = (0, 0);
    records.retain(|r| match r.language {
        Language::Arabic => {
            kept_ar += 1;
            kept_ar <= target
        }
        Language::English => {
            kept_en += 1;
            kept_en <= target
        }
        Language::Bilingual => true,
    });
    Some(before - records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgeBracket;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn record(id: usize, language: Language, age: AgeBracket) -> DemographicRecord {
        DemographicRecord {
            subject_id: format!("s-{id}"),
            language,
            age_bracket: age,
            cultural_background: "default".into(),
            socioeconomic: None,
            mean_achievement: Some(0.6),
        }
    }

    fn count(records: &[DemographicRecord], language: Language) -> usize {
        records.iter().filter(|r| r.language == language).count()
    }

    #[test]
    fn test_nothing_detected_leaves_data_unchanged() {
        let detector = BiasDetector::default();
        let records: Vec<_> = (0..10)
            .map(|i| {
                let lang = if i % 2 == 0 { Language::Arabic } else { Language::English };
                record(i, lang, AgeBracket::SchoolAge)
            })
            .collect();
        let report = detector.detect(&records);
        let mut rng = StdRng::seed_from_u64(7);
        let result = detector.apply_mitigation(&records, &report, &mut rng);
        assert_eq!(result.status, MitigationStatus::NotRequired);
        assert_eq!(result.records, records);
    }

    #[test]
    fn test_language_imbalance_is_equalized() {
        let detector = BiasDetector::default();
        let mut records: Vec<_> = (0..16)
            .map(|i| record(i, Language::English, AgeBracket::SchoolAge))
            .collect();
        records.extend((16..20).map(|i| record(i, Language::Arabic, AgeBracket::SchoolAge)));
        records.push(record(20, Language::Bilingual, AgeBracket::SchoolAge));

        let report = detector.detect(&records);
        assert!(report.severity >= BiasSeverity::Medium);

        let mut rng = StdRng::seed_from_u64(42);
        let result = detector.apply_mitigation(&records, &report, &mut rng);
        assert_eq!(result.status, MitigationStatus::Mitigated);
        assert_eq!(
            count(&result.records, Language::Arabic),
            count(&result.records, Language::English)
        );
        assert!(count(&result.records, Language::Bilingual) >= 1);
        assert!(!result.applied.is_empty());
    }

    #[test]
    fn test_mitigation_is_deterministic_for_a_seed() {
        let detector = BiasDetector::default();
        let mut records: Vec<_> = (0..12)
            .map(|i| record(i, Language::English, AgeBracket::SchoolAge))
            .collect();
        records.extend((12..14).map(|i| record(i, Language::English, AgeBracket::Adolescent)));
        let report = detector.detect(&records);

        let a = detector.apply_mitigation(&records, &report, &mut StdRng::seed_from_u64(1));
        let b = detector.apply_mitigation(&records, &report, &mut StdRng::seed_from_u64(1));
        assert_eq!(a.records, b.records);

        let adolescents = a
            .records
            .iter()
            .filter(|r| r.age_bracket == AgeBracket::Adolescent)
            .count();
        assert_eq!(adolescents, 12);
        assert!(
            a.records
                .iter()
                .filter(|r| r.age_bracket == AgeBracket::Adolescent)
                .all(|r| r.subject_id == "s-12" || r.subject_id == "s-13")
        );
    }
}
