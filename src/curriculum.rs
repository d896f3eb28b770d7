//! Grade rules and topic rubrics injected into generation prompts.

use crate::domain::{Grade, QuizSet, Topic};

/// Numeric ranges and operations allowed in a word problem for the grade.
pub fn word_problem_rules(grade: Grade) -> &'static str {
  match grade {
    Grade::Two => "The problem should involve addition or subtraction with numbers where the sum is up to 100 and subtraction results are positive.",
    Grade::Three => "The problem should involve either addition or subtraction with 3- or 4-digit numbers, or a simple multiplication or division fact. Results must be whole, non-negative numbers.",
  }
}

/// Grade 3 content expectations per topic.
pub fn grade3_rubric(topic: Topic) -> &'static str {
  match topic {
    Topic::Numbers => "count, order, compare and represent whole numbers up to 1000; place value of 3-digit numbers (hundreds, tens, units); addition and subtraction up to 800; multiplication and division by 2, 3, 4, 5 and 10; unit fractions such as halves, quarters, thirds and fifths.",
    Topic::Patterns => "copy, extend and describe number patterns (counting forwards and backwards in 2s, 3s, 5s, 10s, 25s, 50s and 100s) and geometric patterns made with shapes and lines; identify the missing number in a sequence.",
    Topic::Geometry => "recognise and name 2-D shapes (circles, triangles, squares, rectangles) and 3-D objects (balls, boxes, cylinders, pyramids); describe their faces, sides and corners; lines of symmetry; position and direction (left, right, between, behind).",
    Topic::Measurement => "telling time on analogue and digital clocks, calendars and months; length in centimetres and metres; mass in grams and kilograms; capacity in millilitres and litres; South African currency (rands and cents) including making change.",
    Topic::DataHandling => "collecting and sorting data; reading and drawing tally tables, bar graphs and pictographs (including pictographs where one picture stands for more than one item); answering questions about the data.",
  }
}

/// Each Numbers set leans on a different sub-area so the three sets do not overlap.
pub fn numbers_focus(set: QuizSet) -> &'static str {
  match set.index() {
    1 => "number sense and place value (reading, writing, ordering and comparing numbers, hundreds/tens/units)",
    2 => "calculations (addition, subtraction, multiplication and division, including simple word sums)",
    _ => "fractions and number relationships (unit fractions of shapes and collections, doubling and halving, odd and even)",
  }
}

/// Extra prompt paragraph for the topic/set/grade, empty when no rubric applies.
pub fn curriculum_guidance(topic: Topic, set: QuizSet, grade: Grade) -> String {
  match grade {
    Grade::Two => String::new(),
    Grade::Three => {
      let mut out = format!(
        "Follow the South African Grade 3 curriculum for \"{}\": {}",
        topic.title(),
        grade3_rubric(topic)
      );
      if topic == Topic::Numbers {
        out.push_str(&format!(
          "\nEach of the 3 quiz sets for this topic must emphasise a different part of the curriculum to guarantee variety. Quiz set {} must focus mainly on {}.",
          set,
          numbers_focus(set)
        ));
      }
      out
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grade_two_has_no_rubric() {
    for t in Topic::ALL {
      assert!(curriculum_guidance(t, QuizSet::try_from(1).unwrap(), Grade::Two).is_empty());
    }
  }

  #[test]
  fn grade_three_numbers_sets_have_distinct_focus() {
    let focuses: Vec<String> = QuizSet::all()
      .map(|s| curriculum_guidance(Topic::Numbers, s, Grade::Three))
      .collect();
    assert!(focuses.iter().all(|g| g.contains("place value of 3-digit numbers")));
    assert!(focuses[0].contains("number sense"));
    assert!(focuses[1].contains("calculations"));
    assert!(focuses[2].contains("fractions"));
  }

  #[test]
  fn other_grade_three_topics_get_rubric_without_set_focus() {
    let g = curriculum_guidance(Topic::Measurement, QuizSet::try_from(2).unwrap(), Grade::Three);
    assert!(g.contains("rands and cents"));
    assert!(!g.contains("must focus mainly"));
  }
}
