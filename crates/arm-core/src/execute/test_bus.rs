//! RAM-backed bus used by the handler unit tests.

use crate::api::{Bus, BusError};

pub struct FlatBus {
    bytes: Vec<u8>,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; 0x4000],
        }
    }

    fn span(&self, address: u32, width: usize) -> Result<std::ops::Range<usize>, BusError> {
        let start = address as usize;
        if start + width <= self.bytes.len() {
            Ok(start..start + width)
        } else {
            Err(BusError::Unmapped { address })
        }
    }
}

impl Bus for FlatBus {
    fn read8(&mut self, address: u32) -> Result<u8, BusError> {
        let span = self.span(address, 1)?;
        Ok(self.bytes[span.start])
    }

    fn read16(&mut self, address: u32) -> Result<u16, BusError> {
        let span = self.span(address, 2)?;
        let mut half = [0; 2];
        half.copy_from_slice(&self.bytes[span]);
        Ok(u16::from_le_bytes(half))
    }

    fn read32(&mut self, address: u32) -> Result<u32, BusError> {
        let span = self.span(address, 4)?;
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[span]);
        Ok(u32::from_le_bytes(word))
    }

    fn write8(&mut self, address: u32, value: u8) -> Result<(), BusError> {
        let span = self.span(address, 1)?;
        self.bytes[span.start] = value;
        Ok(())
    }

    fn write16(&mut self, address: u32, value: u16) -> Result<(), BusError> {
        let span = self.span(address, 2)?;
        self.bytes[span].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), BusError> {
        let span = self.span(address, 4)?;
        self.bytes[span].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}
