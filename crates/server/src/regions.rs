//! Fixed region code → label table

use shared::RegionMap;

pub const REGION_CODE_TO_LABEL: &[(&str, &str)] = &[
    ("a", "bathroom"),
    ("b", "bedroom"),
    ("c", "closet"),
    ("d", "dining room"),
    ("e", "entryway/foyer/lobby"),
    ("f", "familyroom"),
    ("g", "garage"),
    ("h", "hallway"),
    ("i", "library"),
    ("j", "laundryroom/mudroom"),
    ("k", "kitchen"),
    ("l", "living room"),
    ("m", "meetingroom/conferenceroom"),
    ("n", "lounge"),
    ("o", "office"),
    ("p", "porch/terrace/deck/driveway"),
    ("r", "rec/game"),
    ("s", "stairs"),
    ("t", "toilet"),
    ("u", "utilityroom/toolroom"),
    ("v", "tv"),
    ("w", "workout/gym/exercise"),
    ("x", "outdoor"),
    ("y", "balcony"),
    ("z", "other room"),
    ("B", "bar"),
    ("C", "classroom"),
    ("D", "dining booth"),
    ("S", "spa/sauna"),
    ("Z", "junk"),
    ("-", "no label"),
];

pub fn region_map() -> RegionMap {
    REGION_CODE_TO_LABEL
        .iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect()
}

pub fn is_known_code(code: &str) -> bool {
    REGION_CODE_TO_LABEL.iter().any(|(c, _)| *c == code)
}
