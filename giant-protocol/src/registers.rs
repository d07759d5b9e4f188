//! Register map of the GIAnT FPGA.
//!
//! Registers `0..32` are read-only status registers, registers from `32` upwards
//! can be written (and usually read back). Every control register is a byte whose
//! bits are described by one of the enums in this module; use `bit()` to get the
//! bit position of a flag and `bits()` to get the encoded value of a multi-bit mode.
use crate::error::ConfigError;

/// All registers that the host talks to.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Register {
    // Fault-injection pulse generator
    FiStatus = 7,
    FiDataOut = 8,
    // Utiming
    UtimingStatus = 13,
    // UTX
    UtxPacketCount = 14,
    UtxStatus = 22,
    // URX
    UrxStatus = 23,
    UrxDataOut = 24,
    UrxPacketSizeOutLow = 25,
    UrxPacketCount = 26,
    UrxPacketSizeOutHigh = 29,
    // Universal triggers
    Utrig1Status = 27,
    Utrig2Status = 28,

    // DAC
    DacVLow = 40,
    DacVHigh = 41,
    DacVOff = 46,
    DacControl = 48,
    // Fault-injection pulse generator
    FiControl = 42,
    FiDataIn = 43,
    FiAddrLow = 44,
    FiAddrHigh = 45,
    FiTriggerControl = 47,
    FiUniversalTriggerControl = 81,
    // Utiming
    UtimingControl = 50,
    UtimingDataIn = 51,
    UtimingAddrLow = 52,
    UtimingAddrHigh = 53,
    // UTX
    UtxControl = 67,
    UtxDataIn = 68,
    UtxPacketSizeLow = 69,
    UtxClockDivider = 70,
    UtxPacketSizeHigh = 80,
    // URX
    UrxControl = 71,
    UrxClockDivider = 72,
    // Universal triggers
    Utrig1Control = 74,
    Utrig1Delay = 75,
    Utrig1Hold = 76,
    Utrig2Control = 77,
    Utrig2Delay = 78,
    Utrig2Hold = 79,
    // GPIO switch
    Gpio1Select = 82,
    Gpio1Control = 83,
    GpioOutputs = 84,
}

impl Register {
    /// First writable register
    pub const WRITE_BEGIN: u8 = 32;

    /// The register number as transmitted to the FPGA
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Whether the host may write this register
    pub const fn is_writable(self) -> bool {
        self.id() >= Self::WRITE_BEGIN
    }
}

macro_rules! register_bits {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),*
        }

        impl $name {
            /// Bit position inside the register
            pub const fn bit(self) -> u8 {
                match self {
                    $($name::$variant => $bit),*
                }
            }

            /// Mask with only this bit set
            pub const fn mask(self) -> u8 {
                1 << self.bit()
            }
        }
    };
}

register_bits! {
    /// Bits of [`Register::FiControl`]
    FiControl {
        WriteEnable = 0,
        Arm = 1,
        Trigger = 2,
    }
}

register_bits! {
    /// Bits of [`Register::UtimingControl`]
    UtimingControl {
        WriteEnable = 0,
        Arm = 1,
        Trigger = 2,
        Disarm = 3,
    }
}

register_bits! {
    /// Status bits shared by both timing controllers
    TimingStatusBit {
        Ready = 0,
        Armed = 1,
    }
}

register_bits! {
    /// Bits of [`Register::UtxControl`]
    UtxControl {
        Start = 0,
        Stop = 1,
        Clear = 2,
        OutMode0 = 3,
        OutMode1 = 4,
        OneToZ = 5,
        DisconnectTxUrx = 6,
        EnableUtiming = 7,
    }
}

register_bits! {
    /// Bits of [`Register::UtxStatus`]
    UtxStatusBit {
        Ready = 0,
        Transmitting = 1,
    }
}

register_bits! {
    /// Bits of [`Register::UrxControl`]
    UrxControl {
        Start = 0,
        Stop = 1,
        Clear = 2,
        ResyncToRisingEdges = 3,
        ResyncToFallingEdges = 4,
        UtimingOrUtx = 5,
        ResyncOnEdge = 6,
    }
}

register_bits! {
    /// Bits of [`Register::UrxStatus`]
    UrxStatusBit {
        Ready = 0,
        Receiving = 1,
        DataInSample = 2,
    }
}

register_bits! {
    /// Bits of the universal trigger control registers
    UtrigControl {
        Arm = 0,
        Force = 1,
        InputMode0 = 2,
        InputMode1 = 3,
        InputMode2 = 4,
        OutputMode0 = 5,
        OutputMode1 = 6,
        OutputMode2 = 7,
    }
}

register_bits! {
    /// Bits of the universal trigger status registers
    UtrigStatusBit {
        Armed = 0,
        Triggered = 1,
    }
}

register_bits! {
    /// Bits of [`Register::DacControl`]
    DacControl {
        Enable = 0,
        TestMode = 1,
        RfidMode = 2,
        UtxMode = 3,
    }
}

register_bits! {
    /// Trigger sources of the fault-injection block, see [`Register::FiTriggerControl`]
    FiTriggerSource {
        DacPower = 0,
        Universal = 1,
        Ext1 = 2,
        Adc = 3,
        GpioOutput0 = 4,
        GpioOutput1 = 5,
        /// Not a source: selects falling instead of rising edges
        InvertEdge = 7,
    }
}

register_bits! {
    /// Sources that feed the universal input of the fault-injection trigger,
    /// see [`Register::FiUniversalTriggerControl`]
    FiUniversalTriggerSource {
        Rfid = 0,
        UtxStart = 1,
        Utiming = 2,
        Utrig1 = 3,
        SmartcardSent = 4,
        SmartcardStartSend = 5,
    }
}

register_bits! {
    /// Bits of [`Register::Gpio1Control`]
    GpioControl {
        Enable = 0,
        Clear = 1,
    }
}

/// Physical GPIO pins of the pin multiplexer.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum GpioPin {
    Gpio0 = 0,
    Gpio1 = 1,
    Gpio2 = 2,
    Gpio3 = 3,
    Gpio4 = 4,
    Gpio5 = 5,
    Gpio6 = 6,
    Gpio7 = 7,
}

impl GpioPin {
    pub const COUNT: usize = 8;

    pub const ALL: [GpioPin; GpioPin::COUNT] = [
        GpioPin::Gpio0,
        GpioPin::Gpio1,
        GpioPin::Gpio2,
        GpioPin::Gpio3,
        GpioPin::Gpio4,
        GpioPin::Gpio5,
        GpioPin::Gpio6,
        GpioPin::Gpio7,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for GpioPin {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        GpioPin::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| ConfigError::out_of_range("GPIO pin", value, 0, 7))
    }
}

/// Internal signals that can be routed onto a [`GpioPin`].
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GpioSelect {
    UtxDataOutValid = 0,
    FiTrigger = 1,
    FiInjectFault = 2,
    UtxStart = 3,
    UrxDataInWithTx = 4,
    DdrDmaStart = 5,
    SmartcardDataSendingTrigger = 6,
    SmartcardDataSentTrigger = 7,
    ThresholdTrigger = 8,
    PicVddEnable = 9,
    NotPicVppEnable = 10,
    PicIspData = 11,
    UtimingOut = 12,
    Utrig1Trigger = 13,
    Utrig2Trigger = 14,
    GpioOutput0 = 15,
    GpioOutput1 = 16,
    GpioOutput2 = 17,
    GpioOutput3 = 18,
    UtxDataOut = 19,
    FiExternalTriggerIn = 20,
    Value0 = 29,
    Value1 = 30,
    ValueZ = 31,
}

impl GpioSelect {
    /// Value written into the select register
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// The four internal GPIO outputs which can be muxed with [`GpioSelect::GpioOutput0`] etc.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GpioOutput {
    Output0 = 0,
    Output1 = 1,
    Output2 = 2,
    Output3 = 3,
}

impl GpioOutput {
    /// Bit position inside [`Register::GpioOutputs`]
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_registers_are_not_writable() {
        assert!(!Register::FiStatus.is_writable());
        assert!(!Register::UrxPacketSizeOutHigh.is_writable());
        assert!(Register::FiControl.is_writable());
        assert!(Register::GpioOutputs.is_writable());
    }

    #[test]
    fn masks_follow_bits() {
        assert_eq!(UtxControl::Clear.mask(), 0b100);
        assert_eq!(UtrigControl::OutputMode2.mask(), 0x80);
        assert_eq!(FiTriggerSource::InvertEdge.bit(), 7);
    }

    #[rstest::rstest]
    #[case(0, Some(GpioPin::Gpio0))]
    #[case(7, Some(GpioPin::Gpio7))]
    #[case(8, None)]
    #[case(255, None)]
    fn gpio_pin_from_index(#[case] index: u8, #[case] expected: Option<GpioPin>) {
        assert_eq!(GpioPin::try_from(index).ok(), expected);
    }
}
