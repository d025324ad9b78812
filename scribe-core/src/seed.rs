//! Demo documents available from startup.

use crate::document::Document;

const DEMO_JS: &str = r#"// Welcome to the Collaborative Code Editor!
// This is a real-time collaborative editor with syntax highlighting

function fibonacci(n) {
    if (n <= 1) return n;
    return fibonacci(n - 1) + fibonacci(n - 2);
}

// Calculate and display fibonacci sequence
for (let i = 0; i < 10; i++) {
    console.log(`Fibonacci(${i}) = ${fibonacci(i)}`);
}

// Object-oriented example
class Calculator {
    constructor() {
        this.history = [];
    }
    
    add(a, b) {
        const result = a + b;
        this.history.push(`${a} + ${b} = ${result}`);
        return result;
    }
    
    getHistory() {
        return this.history;
    }
}

const calc = new Calculator();
console.log(calc.add(5, 3));
console.log(calc.getHistory());"#;

const DEMO_PYTHON: &str = r#"# Welcome to the Collaborative Code Editor!
# Real-time collaboration with syntax highlighting

import math
from datetime import datetime

def calculate_prime_numbers(limit):
    """Generate prime numbers up to the given limit using Sieve of Eratosthenes"""
    sieve = [True] * (limit + 1)
    sieve[0] = sieve[1] = False
    
    for i in range(2, int(math.sqrt(limit)) + 1):
        if sieve[i]:
            for j in range(i * i, limit + 1, i):
                sieve[j] = False
    
    return [i for i in range(2, limit + 1) if sieve[i]]

# Data analysis example
class DataAnalyzer:
    def __init__(self, data):
        self.data = data
        self.timestamp = datetime.now()
    
    def calculate_statistics(self):
        if not self.data:
            return None
        
        return {
            'mean': sum(self.data) / len(self.data),
            'min': min(self.data),
            'max': max(self.data),
            'count': len(self.data)
        }
    
    def filter_outliers(self, threshold=2):
        if len(self.data) < 2:
            return self.data
        
        mean = sum(self.data) / len(self.data)
        std_dev = (sum((x - mean) ** 2 for x in self.data) / len(self.data)) ** 0.5
        
        return [x for x in self.data if abs(x - mean) <= threshold * std_dev]

# Example usage
sample_data = [1, 2, 3, 4, 5, 100, 6, 7, 8, 9, 10]
analyzer = DataAnalyzer(sample_data)

print("Original data:", sample_data)
print("Statistics:", analyzer.calculate_statistics())
print("Without outliers:", analyzer.filter_outliers())
print("Prime numbers up to 50:", calculate_prime_numbers(50))"#;

/// The two seeded documents, `demo-js` and `demo-python`.
pub fn demo_documents() -> Vec<Document> {
    vec![
        Document::new("demo-js", "JavaScript Demo", "javascript", DEMO_JS),
        Document::new("demo-python", "Python Demo", "python", DEMO_PYTHON),
    ]
}
