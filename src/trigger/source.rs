//! Trigger source configuration.
//!
//! Each capture engine has its own bank of trigger inputs: an enable bit and
//! a blanking bit per input, plus a hit readback recording which inputs
//! caused the last trigger. The DDR sees all five inputs, the BUF only three.
//!
//! Register access for a bank goes through [`SourceBank`], implemented once
//! per engine by [`DdrBank`] and [`BufBank`].

use serde::{Deserialize, Serialize};

use crate::hardware::HardwarePort;

use super::target::CaptureTargetId;

/// A physical trigger input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerInput {
    /// Shared external trigger connector.
    #[serde(rename = "ext")]
    External,
    /// Postmortem event input.
    #[serde(rename = "pm")]
    Postmortem,
    /// ADC min/max limit event.
    #[serde(rename = "adc")]
    AdcLimit,
    /// Sequencer state trigger.
    #[serde(rename = "seq")]
    Sequencer,
    /// SCLK connector input.
    #[serde(rename = "sclk")]
    SystemClock,
}

impl TriggerInput {
    /// DDR inputs in hardware order.
    pub const DDR: [Self; 5] = [
        Self::External,
        Self::Postmortem,
        Self::AdcLimit,
        Self::Sequencer,
        Self::SystemClock,
    ];

    /// BUF inputs in hardware order.
    pub const BUF: [Self; 3] = [Self::External, Self::AdcLimit, Self::Sequencer];

    /// Short name, as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::External => "ext",
            Self::Postmortem => "pm",
            Self::AdcLimit => "adc",
            Self::Sequencer => "seq",
            Self::SystemClock => "sclk",
        }
    }

    /// Inputs wired to the given capture engine, in hardware order.
    #[must_use]
    pub const fn for_target(target: CaptureTargetId) -> &'static [Self] {
        match target {
            CaptureTargetId::Ddr => &Self::DDR,
            CaptureTargetId::Buf => &Self::BUF,
        }
    }

    /// Lists the inputs of `bank` whose bit is set, in bank order.
    #[must_use]
    pub fn select(bank: &[Self], bits: &[bool]) -> Vec<Self> {
        bank.iter()
            .zip(bits)
            .filter_map(|(input, set)| set.then_some(*input))
            .collect()
    }
}

impl std::fmt::Display for TriggerInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Register access for one engine's trigger input bank.
pub trait SourceBank {
    /// Engine owning this bank.
    const OWNER: CaptureTargetId;

    /// Writes the enable vector.
    fn write_enables<H: HardwarePort + ?Sized>(hw: &mut H, enable: &[bool]);

    /// Writes the blanking vector.
    fn write_blanking<H: HardwarePort + ?Sized>(hw: &mut H, blanking: &[bool]);

    /// Reads back which inputs caused the last trigger.
    fn read_hits<H: HardwarePort + ?Sized>(hw: &mut H) -> Vec<bool>;

    /// Inputs of this bank in hardware order.
    #[must_use]
    fn inputs() -> &'static [TriggerInput] {
        TriggerInput::for_target(Self::OWNER)
    }
}

/// DDR trigger input bank.
#[derive(Debug, Clone, Copy)]
pub struct DdrBank;

impl SourceBank for DdrBank {
    const OWNER: CaptureTargetId = CaptureTargetId::Ddr;

    fn write_enables<H: HardwarePort + ?Sized>(hw: &mut H, enable: &[bool]) {
        hw.write_ddr_source_enables(enable);
    }

    fn write_blanking<H: HardwarePort + ?Sized>(hw: &mut H, blanking: &[bool]) {
        hw.write_ddr_source_blanking(blanking);
    }

    fn read_hits<H: HardwarePort + ?Sized>(hw: &mut H) -> Vec<bool> {
        hw.read_ddr_source_hits()
    }
}

/// BUF trigger input bank.
#[derive(Debug, Clone, Copy)]
pub struct BufBank;

impl SourceBank for BufBank {
    const OWNER: CaptureTargetId = CaptureTargetId::Buf;

    fn write_enables<H: HardwarePort + ?Sized>(hw: &mut H, enable: &[bool]) {
        hw.write_buf_source_enables(enable);
    }

    fn write_blanking<H: HardwarePort + ?Sized>(hw: &mut H, blanking: &[bool]) {
        hw.write_buf_source_blanking(blanking);
    }

    fn read_hits<H: HardwarePort + ?Sized>(hw: &mut H) -> Vec<bool> {
        hw.read_buf_source_hits()
    }
}

/// Enable, blanking and hit vectors of one input bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSourceConfig {
    /// Engine owning the bank.
    pub owner: CaptureTargetId,
    /// Inputs allowed to trigger the engine.
    pub enable: Vec<bool>,
    /// Inputs that respect the blanking window.
    pub blanking: Vec<bool>,
    /// Inputs responsible for the last trigger.
    pub hit: Vec<bool>,
}

impl TriggerSourceConfig {
    /// Creates an all-disabled bank for `owner`.
    #[must_use]
    pub fn new(owner: CaptureTargetId) -> Self {
        let len = TriggerInput::for_target(owner).len();
        Self {
            owner,
            enable: vec![false; len],
            blanking: vec![false; len],
            hit: vec![false; len],
        }
    }

    /// Inputs of this bank in hardware order.
    #[must_use]
    pub const fn inputs(&self) -> &'static [TriggerInput] {
        TriggerInput::for_target(self.owner)
    }

    /// Builds a bank vector with the listed inputs set.
    ///
    /// # Panics
    ///
    /// Panics if an input is not wired to this bank.
    #[must_use]
    pub fn mask(&self, selected: &[TriggerInput]) -> Vec<bool> {
        let inputs = self.inputs();
        for input in selected {
            assert!(
                inputs.contains(input),
                "trigger input {input} is not wired to {}",
                self.owner
            );
        }
        inputs.iter().map(|i| selected.contains(i)).collect()
    }

    /// Lists the inputs set in a bank vector.
    #[must_use]
    pub fn selected(&self, bits: &[bool]) -> Vec<TriggerInput> {
        TriggerInput::select(self.inputs(), bits)
    }

    fn check_len(&self, what: &str, bits: &[bool]) {
        assert_eq!(
            bits.len(),
            self.inputs().len(),
            "{what} vector for {} must have one entry per input",
            self.owner
        );
    }

    /// Updates and writes the enable vector.
    ///
    /// # Panics
    ///
    /// Panics if `enable` does not have one entry per input.
    pub fn set_enables<B: SourceBank, H: HardwarePort + ?Sized>(
        &mut self,
        hw: &mut H,
        enable: &[bool],
    ) {
        debug_assert_eq!(self.owner, B::OWNER);
        self.check_len("enable", enable);
        self.enable = enable.to_vec();
        B::write_enables(hw, &self.enable);
    }

    /// Updates and writes the blanking vector.
    ///
    /// # Panics
    ///
    /// Panics if `blanking` does not have one entry per input.
    pub fn set_blanking<B: SourceBank, H: HardwarePort + ?Sized>(
        &mut self,
        hw: &mut H,
        blanking: &[bool],
    ) {
        debug_assert_eq!(self.owner, B::OWNER);
        self.check_len("blanking", blanking);
        self.blanking = blanking.to_vec();
        B::write_blanking(hw, &self.blanking);
    }

    /// Reads the hit vector back from hardware.
    ///
    /// # Panics
    ///
    /// Panics if the hardware returns a vector of the wrong length.
    pub fn refresh_hits<B: SourceBank, H: HardwarePort + ?Sized>(&mut self, hw: &mut H) -> &[bool] {
        debug_assert_eq!(self.owner, B::OWNER);
        let hit = B::read_hits(hw);
        self.check_len("hit", &hit);
        self.hit = hit;
        &self.hit
    }

    /// Clears the hit vector ahead of a new trigger.
    pub fn reset_hits(&mut self) {
        self.hit.fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HwCall, SimHardware};

    #[test]
    fn new_bank_sizes_follow_owner() {
        assert_eq!(TriggerSourceConfig::new(CaptureTargetId::Ddr).enable.len(), 5);
        assert_eq!(TriggerSourceConfig::new(CaptureTargetId::Buf).enable.len(), 3);
    }

    #[test]
    fn mask_and_selected_agree() {
        let bank = TriggerSourceConfig::new(CaptureTargetId::Buf);
        let bits = bank.mask(&[TriggerInput::Sequencer, TriggerInput::External]);
        assert_eq!(bits, vec![true, false, true]);
        assert_eq!(
            bank.selected(&bits),
            vec![TriggerInput::External, TriggerInput::Sequencer]
        );
    }

    #[test]
    fn select_follows_bank_order() {
        let bits = [false, true, false, true, true];
        assert_eq!(
            TriggerInput::select(&TriggerInput::DDR, &bits),
            vec![
                TriggerInput::Postmortem,
                TriggerInput::Sequencer,
                TriggerInput::SystemClock
            ]
        );
        assert_eq!(
            TriggerInput::select(&TriggerInput::BUF, &bits[..3]),
            vec![TriggerInput::AdcLimit]
        );
    }

    #[test]
    #[should_panic(expected = "not wired to buf")]
    fn mask_rejects_unwired_input() {
        let bank = TriggerSourceConfig::new(CaptureTargetId::Buf);
        let _ = bank.mask(&[TriggerInput::Postmortem]);
    }

    #[test]
    fn set_enables_writes_through_bank() {
        let mut hw = SimHardware::new();
        let mut bank = TriggerSourceConfig::new(CaptureTargetId::Ddr);
        bank.set_enables::<DdrBank, _>(&mut hw, &[true, false, false, true, false]);
        assert_eq!(
            hw.calls(),
            &[HwCall::WriteEnables {
                target: CaptureTargetId::Ddr,
                bits: vec![true, false, false, true, false],
            }]
        );
        assert_eq!(hw.enables(CaptureTargetId::Ddr), bank.enable.as_slice());
    }

    #[test]
    fn set_blanking_writes_buf_register() {
        let mut hw = SimHardware::new();
        let mut bank = TriggerSourceConfig::new(CaptureTargetId::Buf);
        bank.set_blanking::<BufBank, _>(&mut hw, &[false, true, false]);
        assert_eq!(hw.blanking_bits(CaptureTargetId::Buf), &[false, true, false]);
    }

    #[test]
    #[should_panic(expected = "one entry per input")]
    fn set_enables_rejects_wrong_length() {
        let mut hw = SimHardware::new();
        let mut bank = TriggerSourceConfig::new(CaptureTargetId::Buf);
        bank.set_enables::<BufBank, _>(&mut hw, &[true, false]);
    }

    #[test]
    fn refresh_and_reset_hits() {
        let mut hw = SimHardware::new();
        hw.write_buf_source_enables(&[true, false, false]);
        hw.arm(false, true);
        hw.fire_external();

        let mut bank = TriggerSourceConfig::new(CaptureTargetId::Buf);
        assert_eq!(bank.refresh_hits::<BufBank, _>(&mut hw), &[true, false, false]);
        bank.reset_hits();
        assert_eq!(bank.hit, vec![false; 3]);
    }
}
