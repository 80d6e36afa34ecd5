use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::defaults::{
    COL_ACADEMIC_YEAR, COL_BIRTHDATE, COL_EMAIL, COL_GIVEN_NAMES, COL_NATIONAL_ID,
    COL_NATIONAL_ID_PLACE, COL_PHONE, COL_SURNAME, COL_TRACK, COL_UNIT,
};
use crate::table::Frame;

/// Columns of a generated enrollment table: everything the default key set
/// reads plus a couple of consolidated attributes.
pub const ENROLLMENT_COLUMNS: &[&str] = &[
    COL_SURNAME,
    COL_GIVEN_NAMES,
    COL_BIRTHDATE,
    COL_NATIONAL_ID,
    COL_NATIONAL_ID_PLACE,
    COL_PHONE,
    COL_EMAIL,
    COL_UNIT,
    COL_TRACK,
    COL_ACADEMIC_YEAR,
    "sexe",
    "adresse",
];

/// One enrollment line, built field by field.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRow {
    cells: Vec<(String, String)>,
}

impl EnrollmentRow {
    pub fn new(surname: &str, given_names: &str) -> Self {
        Self::default()
            .with(COL_SURNAME, surname)
            .with(COL_GIVEN_NAMES, given_names)
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.cells.retain(|(name, _)| name != column);
        self.cells.push((column.to_string(), value.to_string()));
        self
    }

    pub fn birthdate(self, value: &str) -> Self {
        self.with(COL_BIRTHDATE, value)
    }

    pub fn cin(self, value: &str) -> Self {
        self.with(COL_NATIONAL_ID, value)
    }

    pub fn cin_place(self, value: &str) -> Self {
        self.with(COL_NATIONAL_ID_PLACE, value)
    }

    pub fn phone(self, value: &str) -> Self {
        self.with(COL_PHONE, value)
    }

    pub fn mail(self, value: &str) -> Self {
        self.with(COL_EMAIL, value)
    }

    pub fn unit(self, unit: &str, track: &str) -> Self {
        self.with(COL_UNIT, unit).with(COL_TRACK, track)
    }

    pub fn year(self, value: &str) -> Self {
        self.with(COL_ACADEMIC_YEAR, value)
    }

    fn get(&self, column: &str) -> &str {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }
}

/// Frame over [`ENROLLMENT_COLUMNS`]; unset fields are missing.
pub fn enrollment_frame(rows: &[EnrollmentRow]) -> Frame {
    let records: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| ENROLLMENT_COLUMNS.iter().map(|column| row.get(column)).collect())
        .collect();
    Frame::from_records(ENROLLMENT_COLUMNS, &records).expect("valid enrollment frame")
}

#[derive(Debug, Clone)]
pub struct GeneratedEnrollments {
    pub frame: Frame,
    /// Generating student of every row
    pub person: Vec<u32>,
}

const SURNAMES: &[&str] = &[
    "Rakoto", "Rabe", "Randria", "Rasoa", "Andriana", "Razafy", "Rajaona", "Ravelo",
];
const GIVEN_NAMES: &[&str] = &["Jean", "Paul", "Marie", "Hery", "Fara", "Tiana", "Naina", ""];
const UNITS: &[(&str, &str)] = &[
    ("ENI", "INFO"),
    ("ENI", "GEST"),
    ("FAC-SCI", "MATH"),
    ("FAC-DEG", "ECO"),
];
const PLACES: &[&str] = &["Antananarivo", "Fianarantsoa", "Toamasina"];
const YEARS: &[&str] = &["2021-2022", "2022-2023", "2023-2024", "2024-2025"];

#[derive(Debug, Clone)]
struct Person {
    surname: String,
    given: &'static str,
    birthdate: String,
    cin: String,
    place: &'static str,
    phone: String,
    mail: String,
    unit: (&'static str, &'static str),
    sex: &'static str,
}

/// Generate an enrollment table where students re-enroll over several years,
/// with fields dropped at random on each line.
///
/// `homonym_probability` is the chance that a new student copies the previous
/// student's name and unit while keeping distinct strong identifiers.
pub fn generate_enrollments(
    students: u32,
    duplicate_probability: f64,
    homonym_probability: f64,
    seed: u64,
) -> GeneratedEnrollments {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut people: Vec<Person> = Vec::with_capacity(students as usize);

    for i in 0..students {
        let person = match people.last() {
            Some(previous) if rng.random_bool(homonym_probability) => Person {
                birthdate: random_birthdate(&mut rng),
                cin: format!("{:012}", 100_000_000_000u64 + i as u64),
                phone: format!("034{:07}", i),
                mail: format!("homonym{}@mail.mg", i),
                ..previous.clone()
            },
            _ => Person {
                surname: format!("{}{}", SURNAMES[rng.random_range(0..SURNAMES.len())], i),
                given: GIVEN_NAMES[rng.random_range(0..GIVEN_NAMES.len())],
                birthdate: random_birthdate(&mut rng),
                cin: format!("{:012}", 100_000_000_000u64 + i as u64),
                place: PLACES[rng.random_range(0..PLACES.len())],
                phone: format!("034{:07}", i),
                mail: format!("student{}@mail.mg", i),
                unit: UNITS[rng.random_range(0..UNITS.len())],
                sex: if rng.random_bool(0.5) { "M" } else { "F" },
            },
        };
        people.push(person);
    }

    let mut lines: Vec<(u32, EnrollmentRow)> = Vec::new();
    for (idx, person) in people.iter().enumerate() {
        let mut enrollments = 1;
        while enrollments < YEARS.len() && rng.random_bool(duplicate_probability) {
            enrollments += 1;
        }
        let first_year = rng.random_range(0..=YEARS.len() - enrollments);
        for year in &YEARS[first_year..first_year + enrollments] {
            lines.push((idx as u32, enrollment_line(&mut rng, person, year)));
        }
    }
    lines.shuffle(&mut rng);

    let (person, rows): (Vec<u32>, Vec<EnrollmentRow>) = lines.into_iter().unzip();
    GeneratedEnrollments {
        frame: enrollment_frame(&rows),
        person,
    }
}

fn random_birthdate(rng: &mut StdRng) -> String {
    format!(
        "{:02}/{:02}/{}",
        rng.random_range(1..=28),
        rng.random_range(1..=12),
        rng.random_range(1995..2006)
    )
}

fn enrollment_line(rng: &mut StdRng, person: &Person, year: &str) -> EnrollmentRow {
    let surname = if rng.random_bool(0.2) {
        person.surname.to_lowercase()
    } else {
        person.surname.clone()
    };
    let mut row = EnrollmentRow::new(&surname, person.given)
        .unit(person.unit.0, person.unit.1)
        .year(year)
        .with("sexe", person.sex);
    if rng.random_bool(0.7) {
        row = row.birthdate(&person.birthdate);
    }
    if rng.random_bool(0.6) {
        row = row.cin(&person.cin).cin_place(person.place);
    }
    if rng.random_bool(0.5) {
        row = row.phone(&person.phone);
    }
    if rng.random_bool(0.4) {
        row = row.mail(&person.mail);
    }
    if rng.random_bool(0.3) {
        row = row.with("adresse", &format!("Lot {} {}", person.phone, person.place));
    }
    row
}
