//! Fixed reference atlas shared by the synthetic sources.

use neurotwin_core::{BrainRegion, Hemisphere, NeuralConnection, RegionId, SymptomId};

pub(crate) struct RegionSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub hemisphere: Hemisphere,
    pub baseline: f32,
}

pub(crate) const REGIONS: &[RegionSpec] = &[
    RegionSpec { id: "prefrontal_l", name: "Left dorsolateral prefrontal cortex", hemisphere: Hemisphere::Left, baseline: 0.55 },
    RegionSpec { id: "prefrontal_r", name: "Right dorsolateral prefrontal cortex", hemisphere: Hemisphere::Right, baseline: 0.52 },
    RegionSpec { id: "anterior_cingulate", name: "Anterior cingulate cortex", hemisphere: Hemisphere::Midline, baseline: 0.48 },
    RegionSpec { id: "amygdala_l", name: "Left amygdala", hemisphere: Hemisphere::Left, baseline: 0.40 },
    RegionSpec { id: "amygdala_r", name: "Right amygdala", hemisphere: Hemisphere::Right, baseline: 0.42 },
    RegionSpec { id: "hippocampus_l", name: "Left hippocampus", hemisphere: Hemisphere::Left, baseline: 0.45 },
    RegionSpec { id: "hippocampus_r", name: "Right hippocampus", hemisphere: Hemisphere::Right, baseline: 0.44 },
    RegionSpec { id: "insula_l", name: "Left insula", hemisphere: Hemisphere::Left, baseline: 0.38 },
    RegionSpec { id: "insula_r", name: "Right insula", hemisphere: Hemisphere::Right, baseline: 0.39 },
    RegionSpec { id: "thalamus", name: "Thalamus", hemisphere: Hemisphere::Midline, baseline: 0.60 },
    RegionSpec { id: "motor_cortex_l", name: "Left primary motor cortex", hemisphere: Hemisphere::Left, baseline: 0.35 },
    RegionSpec { id: "motor_cortex_r", name: "Right primary motor cortex", hemisphere: Hemisphere::Right, baseline: 0.35 },
];

pub(crate) const CONNECTIONS: &[(&str, &str, f32)] = &[
    ("prefrontal_l", "anterior_cingulate", 0.8),
    ("prefrontal_r", "anterior_cingulate", 0.75),
    ("anterior_cingulate", "amygdala_l", 0.6),
    ("anterior_cingulate", "amygdala_r", 0.62),
    ("amygdala_l", "hippocampus_l", 0.7),
    ("amygdala_r", "hippocampus_r", 0.68),
    ("insula_l", "amygdala_l", 0.5),
    ("insula_r", "amygdala_r", 0.52),
    ("thalamus", "prefrontal_l", 0.65),
    ("thalamus", "prefrontal_r", 0.64),
    ("thalamus", "motor_cortex_l", 0.58),
    ("thalamus", "motor_cortex_r", 0.57),
];

pub(crate) struct SymptomSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub regions: &'static [&'static str],
}

pub(crate) const SYMPTOMS: &[SymptomSpec] = &[
    SymptomSpec { id: "anhedonia", name: "Anhedonia", regions: &["prefrontal_l", "anterior_cingulate"] },
    SymptomSpec { id: "anxiety", name: "Generalized anxiety", regions: &["amygdala_l", "amygdala_r", "insula_r"] },
    SymptomSpec { id: "memory_impairment", name: "Episodic memory impairment", regions: &["hippocampus_l", "hippocampus_r"] },
    SymptomSpec { id: "tremor", name: "Resting tremor", regions: &["motor_cortex_l", "thalamus"] },
    SymptomSpec { id: "insomnia", name: "Sleep-onset insomnia", regions: &["thalamus", "prefrontal_r"] },
];

pub(crate) struct TreatmentSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub base_efficacy: f32,
    pub targets: &'static [&'static str],
}

pub(crate) const TREATMENTS: &[TreatmentSpec] = &[
    TreatmentSpec { id: "ssri", name: "Selective serotonin reuptake inhibitor", base_efficacy: 0.55, targets: &["amygdala_l", "amygdala_r", "prefrontal_l"] },
    TreatmentSpec { id: "rtms", name: "Repetitive transcranial magnetic stimulation", base_efficacy: 0.6, targets: &["prefrontal_l"] },
    TreatmentSpec { id: "cbt", name: "Cognitive behavioural therapy", base_efficacy: 0.5, targets: &["anterior_cingulate", "amygdala_r", "insula_r"] },
    TreatmentSpec { id: "dbs", name: "Deep brain stimulation", base_efficacy: 0.7, targets: &["thalamus", "motor_cortex_l"] },
    TreatmentSpec { id: "cognitive_training", name: "Computerised cognitive training", base_efficacy: 0.35, targets: &["hippocampus_l", "hippocampus_r"] },
];

pub(crate) fn regions() -> Vec<BrainRegion> {
    REGIONS
        .iter()
        .map(|r| BrainRegion {
            id: RegionId::from(r.id),
            name: r.name.to_string(),
            hemisphere: r.hemisphere,
            baseline_activity: r.baseline,
        })
        .collect()
}

pub(crate) fn connections() -> Vec<NeuralConnection> {
    CONNECTIONS
        .iter()
        .map(|(s, t, w)| NeuralConnection {
            source: RegionId::from(*s),
            target: RegionId::from(*t),
            strength: *w,
        })
        .collect()
}

pub(crate) fn symptom(id: &SymptomId) -> Option<&'static SymptomSpec> {
    SYMPTOMS.iter().find(|s| s.id == id.as_str())
}
