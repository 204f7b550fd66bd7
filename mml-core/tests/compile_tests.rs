use mml_core::parser::{compile, MmlError};
use mml_core::types::{end_time, Note};
use pretty_assertions::assert_eq;

fn starts(notes: &[Note]) -> Vec<u64> {
    notes.iter().map(|n| n.start_time).collect()
}

fn pitches(notes: &[Note]) -> Vec<i32> {
    notes.iter().map(|n| n.pitch).collect()
}

#[test]
fn test_end_to_end_example() {
    let notes = compile("t120 l4 c d e").unwrap();
    assert_eq!(starts(&notes), vec![0, 500, 1000]);
    assert_eq!(pitches(&notes), vec![60, 62, 64]);
    assert!(notes.iter().all(|n| n.duration == 500));
    assert!(notes.iter().all(|n| n.volume == 127 && n.track == 0));
}

#[test]
fn test_note_metadata() {
    let notes = compile("t120 l4 c d e").unwrap();
    assert_eq!(
        notes[1],
        Note {
            found_at: 10,
            clause: "d ".to_string(),
            track: 0,
            volume: 127,
            pitch: 62,
            start_time: 500,
            duration: 500,
        }
    );
}

#[test]
fn test_compile_is_deterministic() {
    let text = "t150 o4 l8 c+ d e-. r16 f&f g, >a4 b8 c";
    assert_eq!(compile(text).unwrap(), compile(text).unwrap());
}

#[test]
fn test_tie_folds_into_one_note() {
    let single = compile("c4").unwrap();
    let tied = compile("c4&c4").unwrap();
    assert_eq!(tied.len(), 1);
    assert_eq!(tied[0].duration, single[0].duration * 2);
    assert_eq!(tied[0].start_time, 0);
    // The clause reported is the one that closed the chain
    assert_eq!(tied[0].found_at, 3);
}

#[test]
fn test_tie_chain_advances_following_note() {
    let notes = compile("c8&c8&c4 d").unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].duration, 2000);
    assert_eq!(notes[1].start_time, 2000);
}

#[test]
fn test_dot_scaling() {
    let plain = compile("c4").unwrap()[0].duration;
    assert_eq!(compile("c4.").unwrap()[0].duration, plain * 3 / 2);
    assert_eq!(compile("c4..").unwrap()[0].duration, plain * 9 / 4);
}

#[test]
fn test_track_isolation() {
    let notes = compile("c,c").unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].track, 0);
    assert_eq!(notes[1].track, 1);
    assert_eq!(notes[0].start_time, 0);
    assert_eq!(notes[1].start_time, 0);
}

#[test]
fn test_tracks_keep_source_order() {
    let notes = compile("c d e, f").unwrap();
    assert_eq!(starts(&notes), vec![0, 1000, 2000, 0]);
    let offsets: Vec<usize> = notes.iter().map(|n| n.found_at).collect();
    let mut sorted = offsets.clone();
    sorted.sort();
    assert_eq!(offsets, sorted);
}

#[test]
fn test_rest_advances_cursor_without_note() {
    let notes = compile("r4 c").unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].start_time, 1000);
}

#[test]
fn test_octave_commands_agree() {
    let set = compile("o4c").unwrap();
    let down = compile("<c").unwrap();
    assert_eq!(set[0].pitch, down[0].pitch);
    assert_eq!(set[0].pitch, 48);
}

#[test]
fn test_volume_is_captured_per_note() {
    let notes = compile("c v64 d").unwrap();
    assert_eq!(notes[0].volume, 127);
    assert_eq!(notes[1].volume, 64);
}

#[test]
fn test_case_insensitive() {
    assert_eq!(
        pitches(&compile("T120 C D E").unwrap()),
        pitches(&compile("t120 c d e").unwrap())
    );
}

#[test]
fn test_comments_keep_offsets() {
    let notes = compile("# intro\nc d").unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].found_at, 8);
    assert_eq!(notes[1].found_at, 10);
}

#[test]
fn test_sharp_hash_is_not_a_comment() {
    let notes = compile("c# d").unwrap();
    assert_eq!(pitches(&notes), vec![61, 62]);
}

#[test]
fn test_unknown_clause() {
    let err = compile("z4").unwrap_err();
    assert_eq!(
        err,
        MmlError::UnknownClause {
            clause: "z4".to_string(),
            offset: 0,
        }
    );
}

#[test]
fn test_failure_returns_no_notes() {
    assert!(compile("c d t0 e").is_err());
}

#[test]
fn test_empty_input() {
    assert!(compile("").unwrap().is_empty());
    assert!(compile("   # nothing here").unwrap().is_empty());
}

#[test]
fn test_endless_dot_chain_is_invalid_length() {
    let score = format!("c{}", ".".repeat(2000));
    match compile(&score) {
        Err(MmlError::InvalidLength { offset, clause, .. }) => {
            assert_eq!(offset, 0);
            assert_eq!(clause, score);
        }
        other => panic!("expected InvalidLength, got {:?}", other),
    }
}

#[test]
fn test_huge_octaves_compile() {
    let notes = compile("o200000000 c").unwrap();
    assert_eq!(pitches(&notes), vec![i32::MAX]);

    let notes = compile("o9999999999 >c <<<d").unwrap();
    assert_eq!(pitches(&notes), vec![i32::MAX, i32::MAX]);

    let low = format!("o0 {} c", "<".repeat(10));
    assert_eq!(pitches(&compile(&low).unwrap()), vec![-120]);
}

#[test]
fn test_runaway_cursor_saturates() {
    let score = format!("c c{} d", ".".repeat(100));
    let notes = compile(&score).unwrap();

    assert_eq!(starts(&notes), vec![0, 1000, u64::MAX]);
    assert_eq!(notes[1].end_time(), u64::MAX);
    assert_eq!(notes[1].duration, u64::MAX - 1000);
    assert_eq!(notes[2].duration, 0);
    assert_eq!(end_time(&notes), u64::MAX);
}
