use std::env;
use std::io;
use std::io::Write;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use treecyk::{
  CykParser, Err, Grammar, ParseTree, ProbabilisticCykParser, ProbabilisticGrammar, SyntacticParser,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} RULES LEXICON [options]

Reads one whitespace-tokenized sentence per line from stdin and prints its parse trees.

Options:
  -h, --help              Print this message
  -p, --probabilistic     Rules carry [probability] suffixes; print only the best trees
  -m, --min-count N       Words seen fewer than N times are parsed as _rare_ (default 1)
  -c, --chart             Print the parse chart (defaults to not printing)
  -g, --grammar           Print the grammar after conversion to Chomsky normal form",
    prog_name
  )
}

enum Loaded {
  Plain(Grammar),
  Probabilistic(ProbabilisticGrammar),
}

fn parse(g: &Loaded, sentence: &str, print_chart: bool) {
  let sentence = sentence.split_whitespace().collect::<Vec<_>>();
  if sentence.is_empty() {
    return;
  }

  let trees: Vec<(ParseTree, Option<f64>)> = match g {
    Loaded::Plain(g) => {
      let parser = CykParser::new(g);
      if print_chart {
        println!("chart:\n{}", parser.chart(&sentence));
      }
      parser.parse(&sentence).into_iter().map(|t| (t, None)).collect()
    }
    Loaded::Probabilistic(g) => {
      let parser = ProbabilisticCykParser::new(g);
      if print_chart {
        println!("chart:\n{}", parser.chart(&sentence));
      }
      parser
        .parse_scored(&sentence)
        .into_iter()
        .map(|(t, p)| (t, Some(p)))
        .collect()
    }
  };

  println!(
    "Parsed {} tree{}",
    trees.len(),
    if trees.len() == 1 { "" } else { "s" }
  );

  for (t, log_probability) in trees {
    println!("{}", t);
    if let Some(p) = log_probability {
      println!("log p = {}", p);
    }
    println!();
  }
}

struct Args {
  rules: String,
  lexicon: String,
  probabilistic: bool,
  min_count: usize,
  print_chart: bool,
  print_grammar: bool,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    let mut iter = v.into_iter();
    let Some(prog_name) = iter.next() else {
      return Err(Self::make_error_message("bad argument vector", "cli"));
    };

    let mut files: Vec<String> = Vec::new();
    let mut probabilistic = false;
    let mut min_count = 1;
    let mut print_chart = false;
    let mut print_grammar = false;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-p" || o == "--probabilistic" {
        probabilistic = true;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-g" || o == "--grammar" {
        print_grammar = true;
      } else if o == "-m" || o == "--min-count" {
        min_count = match iter.next().map(|n| n.parse::<usize>()) {
          Some(Ok(n)) => n,
          _ => return Err(Self::make_error_message("--min-count needs a number", prog_name)),
        };
      } else if o.starts_with('-') {
        return Err(Self::make_error_message(&format!("unknown option {}", o), prog_name));
      } else {
        files.push(o);
      }
    }

    let mut files = files.into_iter();
    match (files.next(), files.next(), files.next()) {
      (Some(rules), Some(lexicon), None) => Ok(Self {
        rules,
        lexicon,
        probabilistic,
        min_count,
        print_chart,
        print_grammar,
      }),
      (None, _, _) | (Some(_), None, _) => Err(Self::make_error_message("missing filename", prog_name)),
      _ => Err(Self::make_error_message("invalid arguments", prog_name)),
    }
  }
}

fn load(opts: &Args) -> Result<Loaded, Err> {
  let loaded = if opts.probabilistic {
    let mut g = ProbabilisticGrammar::read_from_files(&opts.rules, &opts.lexicon, opts.min_count)?;
    g.convert_to_chomsky_normal_form();
    Loaded::Probabilistic(g)
  } else {
    let mut g = Grammar::<()>::read_from_files(&opts.rules, &opts.lexicon, opts.min_count)?;
    g.convert_to_chomsky_normal_form();
    Loaded::Plain(g)
  };

  if opts.print_grammar {
    match &loaded {
      Loaded::Plain(g) => print!("{}", g),
      Loaded::Probabilistic(g) => print!("{}", g),
    }
  }
  Ok(loaded)
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let g = load(&opts)?;
  info!(rules = %opts.rules, lexicon = %opts.lexicon, "grammar ready");

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        parse(&g, input.trim(), opts.print_chart);
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
