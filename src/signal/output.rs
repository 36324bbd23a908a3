use crate::error::CtLabError;
use crate::fpga::FpgaValueSetter;
use crate::signal::enums::OutputSource;
use crate::signal::writers::OutputSourceWriter;

/// Routes signals to the two outputs of the board.
pub struct OutputSourceSelector {
    writer: OutputSourceWriter,
}

impl OutputSourceSelector {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self {
            writer: OutputSourceWriter::new(setter),
        }
    }

    #[must_use]
    pub const fn output_source0(&self) -> OutputSource {
        self.writer.source0()
    }

    pub fn set_output_source0(&mut self, source: OutputSource) -> Result<(), CtLabError> {
        self.writer.set_source0(source)
    }

    #[must_use]
    pub const fn output_source1(&self) -> OutputSource {
        self.writer.source1()
    }

    pub fn set_output_source1(&mut self, source: OutputSource) -> Result<(), CtLabError> {
        self.writer.set_source1(source)
    }
}
