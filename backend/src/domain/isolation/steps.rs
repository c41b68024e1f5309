//! GS38 safe isolation checklist.
//!
//! Every record carries exactly eight steps built from [`GS38_STEPS`]. Step
//! identity (number, title, description) never changes after creation; only
//! the evidence captured against a step does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of steps in the GS38 procedure.
pub const GS38_STEP_COUNT: usize = 8;

/// Immutable description of one GS38 step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gs38StepTemplate {
    /// One-based position in the procedure.
    pub step_number: u8,
    /// Short title shown to the electrician.
    pub title: &'static str,
    /// What the step requires.
    pub description: &'static str,
}

/// Canonical GS38 procedure, in execution order.
pub const GS38_STEPS: [Gs38StepTemplate; GS38_STEP_COUNT] = [
    Gs38StepTemplate {
        step_number: 1,
        title: "Identify Circuit",
        description: "Confirm the circuit to be worked on using drawings, charts and labelling.",
    },
    Gs38StepTemplate {
        step_number: 2,
        title: "Identify Isolation Point",
        description: "Locate the device that will disconnect the supply to the circuit.",
    },
    Gs38StepTemplate {
        step_number: 3,
        title: "Prove Voltage Indicator",
        description: "Verify the voltage indicator works against a known live source or proving unit.",
    },
    Gs38StepTemplate {
        step_number: 4,
        title: "Isolate Circuit",
        description: "Switch off and disconnect the supply at the isolation point.",
    },
    Gs38StepTemplate {
        step_number: 5,
        title: "Secure Isolation",
        description: "Fit a lock-off device and warning notice, recording the lock-off number.",
    },
    Gs38StepTemplate {
        step_number: 6,
        title: "Prove Dead",
        description: "Test between all conductors and between each conductor and earth.",
    },
    Gs38StepTemplate {
        step_number: 7,
        title: "Re-verify Indicator",
        description: "Re-prove the voltage indicator on the proving unit after testing.",
    },
    Gs38StepTemplate {
        step_number: 8,
        title: "Begin Work",
        description: "The circuit is confirmed dead and work may start.",
    },
];

/// Look up the template for a one-based step number.
#[must_use]
pub fn template_for(step_number: u8) -> Option<&'static Gs38StepTemplate> {
    GS38_STEPS
        .iter()
        .find(|template| template.step_number == step_number)
}

/// Voltage readings taken while proving dead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoltageReadings {
    /// Line to neutral.
    #[serde(default)]
    pub l_n: Option<f64>,
    /// Line to earth.
    #[serde(default)]
    pub l_e: Option<f64>,
    /// Neutral to earth.
    #[serde(default)]
    pub n_e: Option<f64>,
}

/// One step of a record's checklist together with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsolationStep {
    step_number: u8,
    title: String,
    description: String,
    completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    voltage_readings: Option<VoltageReadings>,
    #[serde(default)]
    lock_off_number: Option<String>,
    #[serde(default)]
    proving_unit_serial: Option<String>,
}

impl IsolationStep {
    /// Build an incomplete step from its template.
    #[must_use]
    pub fn from_template(template: &Gs38StepTemplate) -> Self {
        Self {
            step_number: template.step_number,
            title: template.title.to_owned(),
            description: template.description.to_owned(),
            completed: false,
            completed_at: None,
            photo_url: None,
            notes: None,
            voltage_readings: None,
            lock_off_number: None,
            proving_unit_serial: None,
        }
    }

    /// One-based position in the procedure.
    #[must_use]
    pub fn step_number(&self) -> u8 {
        self.step_number
    }

    /// Template title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Template description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Whether the step has been signed off.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// When the step was completed.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Photo evidence reference.
    #[must_use]
    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    /// Free-text notes.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Readings captured on this step.
    #[must_use]
    pub fn voltage_readings(&self) -> Option<VoltageReadings> {
        self.voltage_readings
    }

    /// Lock-off number recorded on this step.
    #[must_use]
    pub fn lock_off_number(&self) -> Option<&str> {
        self.lock_off_number.as_deref()
    }

    /// Serial of the proving unit used on this step.
    #[must_use]
    pub fn proving_unit_serial(&self) -> Option<&str> {
        self.proving_unit_serial.as_deref()
    }

    /// Whether the step's identity matches the canonical template.
    pub(crate) fn matches_template(&self, template: &Gs38StepTemplate) -> bool {
        self.step_number == template.step_number
            && self.title == template.title
            && self.description == template.description
    }

    pub(crate) fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = completed.then_some(now);
    }

    pub(crate) fn merge_evidence(&mut self, patch: &StepPatch) {
        if let Some(photo_url) = &patch.photo_url {
            self.photo_url = Some(photo_url.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(readings) = patch.voltage_readings {
            self.voltage_readings = Some(readings);
        }
        if let Some(lock_off_number) = &patch.lock_off_number {
            self.lock_off_number = Some(lock_off_number.clone());
        }
        if let Some(serial) = &patch.proving_unit_serial {
            self.proving_unit_serial = Some(serial.clone());
        }
    }
}

/// Changes requested against a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPatch {
    /// Step being changed.
    pub step_number: u8,
    /// New completion flag, if it should change.
    pub completed: Option<bool>,
    /// Photo evidence reference.
    pub photo_url: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Readings taken on this step.
    pub voltage_readings: Option<VoltageReadings>,
    /// Lock-off number.
    pub lock_off_number: Option<String>,
    /// Proving unit serial.
    pub proving_unit_serial: Option<String>,
}

impl StepPatch {
    /// Whether the patch carries evidence besides the completion flag.
    #[must_use]
    pub fn has_evidence(&self) -> bool {
        self.photo_url.is_some()
            || self.notes.is_some()
            || self.voltage_readings.is_some()
            || self.lock_off_number.is_some()
            || self.proving_unit_serial.is_some()
    }
}

/// Fresh checklist with every step incomplete.
#[must_use]
pub fn new_checklist() -> Vec<IsolationStep> {
    GS38_STEPS.iter().map(IsolationStep::from_template).collect()
}

/// Whether `steps` is exactly the GS38 template in order.
#[must_use]
pub fn matches_gs38_template(steps: &[IsolationStep]) -> bool {
    steps.len() == GS38_STEP_COUNT
        && steps
            .iter()
            .zip(GS38_STEPS.iter())
            .all(|(step, template)| step.matches_template(template))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;

    #[test]
    fn checklist_follows_template() {
        let steps = new_checklist();
        assert_eq!(steps.len(), GS38_STEP_COUNT);
        for (index, step) in steps.iter().enumerate() {
            assert_eq!(usize::from(step.step_number()), index + 1);
            assert!(!step.completed());
            assert!(step.completed_at().is_none());
        }
        assert!(matches_gs38_template(&steps));
    }

    #[rstest]
    #[case(1, "Identify Circuit")]
    #[case(2, "Identify Isolation Point")]
    #[case(3, "Prove Voltage Indicator")]
    #[case(4, "Isolate Circuit")]
    #[case(5, "Secure Isolation")]
    #[case(6, "Prove Dead")]
    #[case(7, "Re-verify Indicator")]
    #[case(8, "Begin Work")]
    fn titles_are_exact(#[case] number: u8, #[case] title: &str) {
        let template = template_for(number).expect("template exists");
        assert_eq!(template.title, title);
    }

    #[rstest]
    #[case(0)]
    #[case(9)]
    fn unknown_step_numbers_have_no_template(#[case] number: u8) {
        assert!(template_for(number).is_none());
    }

    #[test]
    fn tampered_checklist_is_rejected() {
        let mut steps = new_checklist();
        steps.swap(0, 1);
        assert!(!matches_gs38_template(&steps));

        let mut short = new_checklist();
        short.pop();
        assert!(!matches_gs38_template(&short));
    }

    #[test]
    fn completion_stamps_and_clears_timestamp() {
        let mut step = IsolationStep::from_template(template_for(1).expect("step 1"));
        let now = Utc::now();
        step.set_completed(true, now);
        assert_eq!(step.completed_at(), Some(now));
        step.set_completed(false, now);
        assert!(step.completed_at().is_none());
    }

    #[test]
    fn evidence_merges_only_supplied_fields() {
        let mut step = IsolationStep::from_template(template_for(5).expect("step 5"));
        step.merge_evidence(&StepPatch {
            step_number: 5,
            lock_off_number: Some("LO-17".to_owned()),
            ..StepPatch::default()
        });
        step.merge_evidence(&StepPatch {
            step_number: 5,
            notes: Some("Padlock fitted".to_owned()),
            ..StepPatch::default()
        });
        assert_eq!(step.lock_off_number(), Some("LO-17"));
        assert_eq!(step.notes(), Some("Padlock fitted"));
    }
}
