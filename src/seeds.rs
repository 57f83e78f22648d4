//! Built-in demo lessons used when no lesson bank is configured.

use crate::domain::{Lesson, Segment};

fn seg(index: usize, start: f64, end: f64, text: &str) -> Segment {
  Segment { index, start_sec: start, end_sec: end, text: text.to_string() }
}

pub fn seed_lessons() -> Vec<Lesson> {
  vec![
    Lesson {
      id: "demo-morgen".into(),
      title: "Ein Morgen in der Stadt".into(),
      audio_url: "/static/audio/demo-morgen.mp3".into(),
      duration_sec: None,
      transcript_url: None,
      transcript: vec![
        seg(0, 0.0, 3.2, "Heute Morgen scheint die Sonne."),
        seg(1, 3.2, 7.1, "Ich trinke einen Kaffee und lese die Zeitung."),
        seg(2, 7.1, 11.4, "Danach fahre ich mit dem Fahrrad zur Arbeit."),
        seg(3, 11.4, 15.0, "Die Straßen sind noch ruhig und leer."),
        seg(4, 15.0, 19.6, "Am Abend treffe ich meine Freunde im Café."),
      ],
    },
    Lesson {
      id: "demo-wetter".into(),
      title: "Über das Wetter".into(),
      audio_url: "/static/audio/demo-wetter.mp3".into(),
      duration_sec: None,
      transcript_url: None,
      transcript: vec![
        seg(0, 0.0, 2.8, "Hallo Welt, wie geht es dir?"),
        seg(1, 2.8, 6.5, "Das Wetter ist heute überraschend schön."),
        seg(2, 6.5, 10.2, "Morgen soll es aber wieder regnen."),
      ],
    },
  ]
}
