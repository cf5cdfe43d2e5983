//! Note-name table. Remote keyboards send the sample file name of the key
//! they played; this maps it to a MIDI pitch.

/// Keyboard sample names, two octaves from C1 (48) to C3 (72).
pub const NOTE_TABLE: [(&str, u8); 25] = [
    ("C1.WAV", 48),
    ("CS1.WAV", 49),
    ("D1.WAV", 50),
    ("DS1.WAV", 51),
    ("E1.WAV", 52),
    ("F1.WAV", 53),
    ("FS1.WAV", 54),
    ("G1.WAV", 55),
    ("GS1.WAV", 56),
    ("A1.WAV", 57),
    ("AS1.WAV", 58),
    ("B1.WAV", 59),
    ("C2.WAV", 60),
    ("CS2.WAV", 61),
    ("D2.WAV", 62),
    ("DS2.WAV", 63),
    ("E2.WAV", 64),
    ("F2.WAV", 65),
    ("FS2.WAV", 66),
    ("G2.WAV", 67),
    ("GS2.WAV", 68),
    ("A2.WAV", 69),
    ("AS2.WAV", 70),
    ("B2.WAV", 71),
    ("C3.WAV", 72),
];

/// Pitch for a sample name. Exact, case-sensitive match.
pub fn pitch_for(name: &str) -> Option<u8> {
    NOTE_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, pitch)| *pitch)
}
