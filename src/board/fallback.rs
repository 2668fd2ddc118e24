use crate::types::{Category, FinalClue, GameData, Question, VALUE_TIERS};

/// (title, [(clue, answer); 5]) for each of the five fallback categories
const CATEGORIES: [(&str, [(&str, &str); 5]); 5] = [
    (
        "Christmas Carols",
        [
            (
                "This red-nosed reindeer had a very shiny nose.",
                "Who is Rudolph?",
            ),
            (
                "In \"Jingle Bells\", this is what it is fun to ride in.",
                "What is a one-horse open sleigh?",
            ),
            (
                "This carol demands \"figgy pudding\" right now.",
                "What is We Wish You a Merry Christmas?",
            ),
            (
                "According to the song, \"Good King Wenceslas\" looked out on the feast of this saint.",
                "Who is Stephen?",
            ),
            (
                "This best-selling Christmas single of all time was sung by Bing Crosby.",
                "What is White Christmas?",
            ),
        ],
    ),
    (
        "Holiday Movies",
        [
            (
                "This character hates Christmas and lives on Mount Crumpit.",
                "Who is The Grinch?",
            ),
            (
                "In \"Home Alone\", Kevin McCallister is left behind when his family goes to this city.",
                "What is Paris?",
            ),
            (
                "This 2003 film stars Will Ferrell as a human raised by Santa's elves.",
                "What is Elf?",
            ),
            (
                "In \"It's a Wonderful Life\", every time a bell rings, this happens.",
                "What is an angel gets his wings?",
            ),
            (
                "Bruce Willis saves the Nakatomi Plaza party in this action-packed holiday favorite.",
                "What is Die Hard?",
            ),
        ],
    ),
    (
        "Winter Wonderland",
        [
            (
                "No two of these ice crystals are exactly alike.",
                "What are snowflakes?",
            ),
            (
                "This vegetable is commonly used for a snowman's nose.",
                "What is a carrot?",
            ),
            (
                "The winter solstice occurs in this month in the Northern Hemisphere.",
                "What is December?",
            ),
            (
                "A blizzard is defined by large amounts of snow and winds of at least this many miles per hour.",
                "What is 35?",
            ),
            (
                "This country gives a Christmas tree to London every year to stand in Trafalgar Square.",
                "What is Norway?",
            ),
        ],
    ),
    (
        "Santa's Workshop",
        [
            (
                "Santa Claus is also known as Saint this.",
                "Who is Saint Nicholas?",
            ),
            (
                "These pointed-ear helpers make the toys.",
                "Who are elves?",
            ),
            (
                "This is the postal code assigned to Santa Claus in Canada.",
                "What is H0H 0H0?",
            ),
            (
                "Santa's sleigh is pulled by this number of reindeer (including Rudolph).",
                "What is 9?",
            ),
            (
                "In the poem \"A Visit from St. Nicholas\", Santa is described as smoking one of these.",
                "What is a pipe?",
            ),
        ],
    ),
    (
        "Festive Food",
        [
            (
                "This striped candy is shaped like a shepherd's crook.",
                "What is a candy cane?",
            ),
            (
                "This drink is made with milk, sugar, eggs, and spices.",
                "What is eggnog?",
            ),
            (
                "These cookies are often built into small houses.",
                "What is gingerbread?",
            ),
            (
                "This bird is the traditional main course for British Christmas dinners.",
                "What is Turkey?",
            ),
            (
                "In Italy, this sweet bread loaf is a Christmas staple.",
                "What is Panettone?",
            ),
        ],
    ),
];

const FINAL_CLUE: (&str, &str, &str) = (
    "Christmas Origins",
    "This Roman festival of Saturn, held in mid-December, is often cited as a precursor to Christmas traditions.",
    "What is Saturnalia?",
);

/// The hand-authored holiday board used whenever generation is unavailable.
/// Built fresh on every call so each game gets its own ids and answered flags.
pub fn fallback_board() -> GameData {
    let categories = CATEGORIES
        .iter()
        .map(|(title, questions)| Category {
            id: ulid::Ulid::new().to_string(),
            title: title.to_string(),
            questions: questions
                .iter()
                .zip(VALUE_TIERS)
                .map(|((clue, answer), value)| Question {
                    id: ulid::Ulid::new().to_string(),
                    value,
                    clue: clue.to_string(),
                    answer: answer.to_string(),
                    is_answered: false,
                })
                .collect(),
        })
        .collect();

    let (category, clue, answer) = FINAL_CLUE;
    GameData {
        categories,
        final_clue: FinalClue {
            category: category.to_string(),
            clue: clue.to_string(),
            answer: answer.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::validate;

    #[test]
    fn test_fallback_board_is_valid() {
        let data = fallback_board();
        assert!(validate(&data).is_ok());
        assert_eq!(data.categories[0].title, "Christmas Carols");
        assert_eq!(data.final_clue.answer, "What is Saturnalia?");
        assert!(!data.all_answered());
    }

    #[test]
    fn test_fallback_boards_are_independent() {
        let mut first = fallback_board();
        let second = fallback_board();

        let id = first.categories[0].questions[0].id.clone();
        first.find_question_mut(&id).unwrap().mark_answered();

        assert!(second.categories.iter().all(|c| c.questions.iter().all(|q| !q.is_answered)));
        assert_ne!(first.categories[0].id, second.categories[0].id);
    }
}
