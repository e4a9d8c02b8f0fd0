fn main() {
	let greeting = "hello";
	println!("{}, world", greeting);
}
