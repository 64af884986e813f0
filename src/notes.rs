// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Note names in scientific pitch notation, for the octaves that have samples.

use std::ops::RangeInclusive;

const NOTE_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// The only notes of octave 0 that have samples.
const OCTAVE_ZERO: [&str; 3] = ["A0", "Bb0", "B0"];

const OCTAVES: RangeInclusive<u8> = 0..=7;

/// The note names of one octave, using flats.
pub fn note_names() -> &'static [&'static str] {
    &NOTE_NAMES
}

/// The octaves that have samples.
pub fn octaves() -> RangeInclusive<u8> {
    OCTAVES
}

/// Lists every sampled note of the given octaves, in the order the octaves are first given.
/// An empty list means all octaves. Octaves without samples are skipped.
pub fn pitch_list(octaves: &[u8]) -> Vec<String> {
    let mut seen = Vec::new();
    let requested: Vec<u8> = if octaves.is_empty() {
        OCTAVES.collect()
    } else {
        octaves.to_vec()
    };

    let mut pitches = Vec::new();
    for octave in requested {
        if seen.contains(&octave) {
            continue;
        }
        seen.push(octave);

        match octave {
            0 => pitches.extend(OCTAVE_ZERO.iter().map(|note| note.to_string())),
            octave if OCTAVES.contains(&octave) => {
                pitches.extend(NOTE_NAMES.iter().map(|note| format!("{}{}", note, octave)))
            }
            _ => {}
        }
    }
    pitches
}
