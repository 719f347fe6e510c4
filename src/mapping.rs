//! Controller → parameter mapping and learn mode
//!
//! [`ParameterMap`] is an explicitly owned context object holding the
//! controller table and the "awaiting assignment" slot. Both live under a
//! single mutex so a learn-mode bind (read slot, insert mapping, clear slot)
//! is one indivisible step. The mutex covers the mapping table only; note
//! events and the render thread never touch it.
//!
//! Learn flow:
//!
//! 1. [`ParameterMap::toggle_learn`] arms learn mode (slot = any parameter)
//! 2. [`ParameterMap::select_parameter`] names the target (slot = parameter)
//! 3. The next [`ParameterMap::control_change`] binds that controller and
//!    clears the slot

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Highest valid controller number
pub const MAX_CONTROLLER: u8 = 127;

/// Parameters reachable through mapped controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    FilterCutoff,
    FilterResonance,
    MasterVolume,
    MixerBlend,
    EnvelopeAttack,
    EnvelopeRelease,
    Osc1Pitch,
    Osc2Pitch,
}

impl Parameter {
    pub const ALL: [Parameter; 8] = [
        Parameter::FilterCutoff,
        Parameter::FilterResonance,
        Parameter::MasterVolume,
        Parameter::MixerBlend,
        Parameter::EnvelopeAttack,
        Parameter::EnvelopeRelease,
        Parameter::Osc1Pitch,
        Parameter::Osc2Pitch,
    ];

    /// Dotted name used by control surfaces
    pub fn name(self) -> &'static str {
        match self {
            Parameter::FilterCutoff => "filter.cutoff",
            Parameter::FilterResonance => "filter.resonance",
            Parameter::MasterVolume => "masterVolume",
            Parameter::MixerBlend => "mixer.blend",
            Parameter::EnvelopeAttack => "envelope.attack",
            Parameter::EnvelopeRelease => "envelope.release",
            Parameter::Osc1Pitch => "osc1.pitch",
            Parameter::Osc2Pitch => "osc2.pitch",
        }
    }

    /// Look up a parameter by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::UnknownParameter(s.to_string()))
    }
}

/// State of the learn slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Awaiting {
    /// Learn mode off
    #[default]
    Nothing,
    /// Learn mode armed, waiting for the user to pick a parameter
    AnyParameter,
    /// Waiting for the next controller event to bind to this parameter
    Parameter(Parameter),
}

/// What a controller event resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The controller was bound to a parameter; the value is not applied
    Learned {
        controller: u8,
        parameter: Parameter,
    },
    /// Apply `value` to the mapped parameter
    Dispatch { parameter: Parameter, value: u8 },
    /// No mapping for this controller
    Unmapped,
}

#[derive(Debug, Default)]
struct MappingState {
    assignments: BTreeMap<u8, Parameter>,
    awaiting: Awaiting,
}

/// Controller table plus learn slot, shared by control-event call sites
#[derive(Debug, Default)]
pub struct ParameterMap {
    state: Mutex<MappingState>,
}

impl ParameterMap {
    /// Table with the stock controller assignments
    ///
    /// | CC | Parameter          |
    /// |----|--------------------|
    /// | 1  | `mixer.blend`      |
    /// | 7  | `masterVolume`     |
    /// | 71 | `filter.resonance` |
    /// | 74 | `filter.cutoff`    |
    pub fn new() -> Self {
        let assignments = BTreeMap::from([
            (74, Parameter::FilterCutoff),
            (71, Parameter::FilterResonance),
            (7, Parameter::MasterVolume),
            (1, Parameter::MixerBlend),
        ]);
        Self {
            state: Mutex::new(MappingState {
                assignments,
                awaiting: Awaiting::Nothing,
            }),
        }
    }

    /// Table with no assignments
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bind `controller` to `parameter`, replacing any previous binding
    pub fn assign(&self, controller: u8, parameter: Parameter) -> Result<()> {
        if controller > MAX_CONTROLLER {
            return Err(Error::InvalidController(controller));
        }
        self.state.lock().assignments.insert(controller, parameter);
        Ok(())
    }

    /// Remove a binding, returning the parameter it pointed to
    pub fn unassign(&self, controller: u8) -> Option<Parameter> {
        self.state.lock().assignments.remove(&controller)
    }

    pub fn lookup(&self, controller: u8) -> Option<Parameter> {
        self.state.lock().assignments.get(&controller).copied()
    }

    /// Snapshot of all bindings, ordered by controller number
    pub fn assignments(&self) -> Vec<(u8, Parameter)> {
        self.state
            .lock()
            .assignments
            .iter()
            .map(|(&cc, &p)| (cc, p))
            .collect()
    }

    pub fn awaiting(&self) -> Awaiting {
        self.state.lock().awaiting
    }

    pub fn is_learning(&self) -> bool {
        self.awaiting() != Awaiting::Nothing
    }

    /// Arm learn mode, or cancel it if already armed. Returns the new armed state.
    pub fn toggle_learn(&self) -> bool {
        let mut state = self.state.lock();
        state.awaiting = match state.awaiting {
            Awaiting::Nothing => Awaiting::AnyParameter,
            _ => Awaiting::Nothing,
        };
        let armed = state.awaiting != Awaiting::Nothing;
        debug!(armed, "learn mode toggled");
        armed
    }

    /// Pick the parameter to learn. Only honoured while learn mode is armed
    /// and no parameter has been picked yet.
    pub fn select_parameter(&self, parameter: Parameter) -> bool {
        let mut state = self.state.lock();
        if state.awaiting == Awaiting::AnyParameter {
            state.awaiting = Awaiting::Parameter(parameter);
            debug!(%parameter, "learn target selected");
            true
        } else {
            false
        }
    }

    /// Resolve a controller event.
    ///
    /// With a learn target pending, the controller is bound to it and the
    /// slot cleared in the same critical section. Otherwise the existing
    /// binding (if any) is returned for dispatch.
    pub fn control_change(&self, controller: u8, value: u8) -> ControlOutcome {
        let mut state = self.state.lock();

        if let Awaiting::Parameter(parameter) = state.awaiting {
            if controller <= MAX_CONTROLLER {
                state.assignments.insert(controller, parameter);
                state.awaiting = Awaiting::Nothing;
                drop(state);
                info!(controller, %parameter, "controller learned");
                return ControlOutcome::Learned {
                    controller,
                    parameter,
                };
            }
        }

        match state.assignments.get(&controller) {
            Some(&parameter) => ControlOutcome::Dispatch { parameter, value },
            None => ControlOutcome::Unmapped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_parameter_names_round_trip() {
        for p in Parameter::ALL {
            assert_eq!(Parameter::from_name(p.name()), Some(p));
            assert_eq!(p.name().parse::<Parameter>().unwrap(), p);
        }
        assert_eq!(Parameter::from_name("bogus.name"), None);
        assert!(matches!(
            "bogus.name".parse::<Parameter>(),
            Err(Error::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_default_assignments() {
        let map = ParameterMap::new();
        assert_eq!(map.lookup(74), Some(Parameter::FilterCutoff));
        assert_eq!(map.lookup(71), Some(Parameter::FilterResonance));
        assert_eq!(map.lookup(7), Some(Parameter::MasterVolume));
        assert_eq!(map.lookup(1), Some(Parameter::MixerBlend));
        assert_eq!(map.lookup(2), None);
        assert_eq!(map.assignments().len(), 4);
        assert_eq!(map.assignments()[0], (1, Parameter::MixerBlend));
    }

    #[test]
    fn test_assign_rejects_out_of_range() {
        let map = ParameterMap::empty();
        assert!(matches!(
            map.assign(128, Parameter::Osc1Pitch),
            Err(Error::InvalidController(128))
        ));
        map.assign(20, Parameter::Osc1Pitch).unwrap();
        assert_eq!(map.lookup(20), Some(Parameter::Osc1Pitch));
        assert_eq!(map.unassign(20), Some(Parameter::Osc1Pitch));
        assert_eq!(map.lookup(20), None);
    }

    #[test]
    fn test_control_change_dispatch() {
        let map = ParameterMap::new();
        assert_eq!(
            map.control_change(74, 99),
            ControlOutcome::Dispatch {
                parameter: Parameter::FilterCutoff,
                value: 99
            }
        );
        assert_eq!(map.control_change(3, 10), ControlOutcome::Unmapped);
    }

    #[test]
    fn test_learn_flow() {
        let map = ParameterMap::new();
        assert!(!map.select_parameter(Parameter::Osc2Pitch));

        assert!(map.toggle_learn());
        assert_eq!(map.awaiting(), Awaiting::AnyParameter);

        // Armed but no target yet: controller events dispatch normally
        assert_eq!(map.control_change(21, 5), ControlOutcome::Unmapped);
        assert_eq!(map.awaiting(), Awaiting::AnyParameter);

        assert!(map.select_parameter(Parameter::Osc2Pitch));
        assert!(!map.select_parameter(Parameter::Osc1Pitch));
        assert_eq!(map.awaiting(), Awaiting::Parameter(Parameter::Osc2Pitch));

        assert_eq!(
            map.control_change(21, 64),
            ControlOutcome::Learned {
                controller: 21,
                parameter: Parameter::Osc2Pitch
            }
        );
        assert_eq!(map.awaiting(), Awaiting::Nothing);
        assert_eq!(map.lookup(21), Some(Parameter::Osc2Pitch));

        assert_eq!(
            map.control_change(21, 64),
            ControlOutcome::Dispatch {
                parameter: Parameter::Osc2Pitch,
                value: 64
            }
        );
    }

    #[test]
    fn test_learn_rebinds_existing_controller() {
        let map = ParameterMap::new();
        map.toggle_learn();
        map.select_parameter(Parameter::EnvelopeRelease);
        map.control_change(74, 0);
        assert_eq!(map.lookup(74), Some(Parameter::EnvelopeRelease));
    }

    #[test]
    fn test_toggle_cancels_learn() {
        let map = ParameterMap::new();
        map.toggle_learn();
        map.select_parameter(Parameter::MixerBlend);
        assert!(!map.toggle_learn());
        assert_eq!(map.awaiting(), Awaiting::Nothing);
        assert!(!map.is_learning());
    }

    #[test]
    fn test_concurrent_learn_binds_exactly_once() {
        let map = Arc::new(ParameterMap::empty());
        map.toggle_learn();
        map.select_parameter(Parameter::FilterResonance);

        let handles: Vec<_> = (0..8u8)
            .map(|cc| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || map.control_change(cc, 1))
            })
            .collect();

        let learned = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, ControlOutcome::Learned { .. }))
            .count();

        assert_eq!(learned, 1);
        assert_eq!(map.assignments().len(), 1);
        assert_eq!(map.awaiting(), Awaiting::Nothing);
    }
}
