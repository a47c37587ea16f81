use bit_field::BitField;

/// Card specific data, 128 bits.
///
/// Word `3` holds bits 127..96, i.e. the first four bytes on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CsdRegister(pub [u32; 4]);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SdCsdStructureVersion {
    Ver1d0 = 0,
    Ver2d0 = 1,
    Reserved,
}

impl CsdRegister {
    pub fn from_bytes(bytes: &[u8; 16]) -> Self {
        let mut words = [0u32; 4];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            words[3 - i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self(words)
    }

    /// Bits `high..=low` of the register, the slice may straddle two words
    pub fn slice(&self, high: usize, low: usize) -> u32 {
        let (low_word, high_word) = (low / 32, high / 32);
        let shift = low % 32;
        if low_word == high_word {
            return self.0[low_word].get_bits(shift..=high % 32);
        }
        let low_part = self.0[low_word].get_bits(shift..32);
        let high_part = self.0[high_word].get_bits(0..=high % 32);
        low_part | (high_part << (32 - shift))
    }

    pub fn sd_csd_structure_version(&self) -> SdCsdStructureVersion {
        match self.slice(127, 126) {
            0 => SdCsdStructureVersion::Ver1d0,
            1 => SdCsdStructureVersion::Ver2d0,
            _ => SdCsdStructureVersion::Reserved,
        }
    }

    pub fn read_bl_length(&self) -> u32 {
        self.slice(83, 80)
    }

    pub fn card_size(&self) -> u32 {
        self.slice(73, 62)
    }

    pub fn card_size_multiplier(&self) -> u32 {
        self.slice(49, 47)
    }

    pub fn sd_2_0_card_size(&self) -> u32 {
        self.slice(69, 48)
    }

    /// Capacity in 512 byte blocks, 0 if the register is not understood
    ///
    /// Version 1.0: BLOCKNR = (C_SIZE + 1) * 2^(C_SIZE_MULT + 2) with
    /// BLOCK_LEN = 2^READ_BL_LEN, rescaled to 512 byte blocks.
    /// Version 2.0: (C_SIZE + 1) * 512KiB.
    pub fn capacity(&self) -> u32 {
        match self.sd_csd_structure_version() {
            SdCsdStructureVersion::Ver1d0 => {
                let read_bl_length = self.read_bl_length();
                if read_bl_length < 9 {
                    return 0;
                }
                (self.card_size() + 1) << (self.card_size_multiplier() + 2) << (read_bl_length - 9)
            }
            SdCsdStructureVersion::Ver2d0 => (self.sd_2_0_card_size() + 1).saturating_mul(1024),
            SdCsdStructureVersion::Reserved => 0,
        }
    }
}
